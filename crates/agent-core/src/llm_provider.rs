use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::model::ConversationTurn;

/// Failures surfaced by a model backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// Connection reset, DNS failure and similar network trouble.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("http status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request cancelled")]
    Cancelled,

    /// The response arrived but could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ModelError {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Transient failures worth another attempt: network errors, timeouts,
    /// rate limiting and server-side errors. Auth and validation errors are
    /// returned immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Cancelled | Self::Malformed(_) => false,
        }
    }
}

/// Sampling parameters forwarded verbatim to the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SamplingParams {
    /// Default: 0.1
    pub temperature: f32,
    /// Default: 0.85
    pub top_p: f32,
    /// Default: 0.2
    pub frequency_penalty: f32,
    /// Default: 3000
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.85,
            frequency_penalty: 0.2,
            max_tokens: 3000,
        }
    }
}

/// One chat completion request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system_prompt: &'a str,
    pub turns: &'a [ConversationTurn],
    pub sampling: &'a SamplingParams,
}

/// Abstraction over chat-completion backends so the loop can run against any vendor.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Return the assistant reply text for the given conversation.
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ModelError>;
}

/// What a [`ScriptedModelClient`] saw on one call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system_prompt: String,
    pub turns: Vec<ConversationTurn>,
}

/// Deterministic client used for tests and offline development.
///
/// Replies are served in order; once the script runs out every call fails
/// with a non-retryable [`ModelError::Malformed`].
#[derive(Debug, Default)]
pub struct ScriptedModelClient {
    script: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Option<Duration>,
}

impl ScriptedModelClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(replies.into_iter().map(|reply| Ok(reply.into())))
    }

    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<String, ModelError>>,
    {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn push_reply(&self, reply: impl Into<String>) {
        self.script.lock().await.push_back(Ok(reply.into()));
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ModelError> {
        self.requests.lock().await.push(RecordedRequest {
            system_prompt: request.system_prompt.to_string(),
            turns: request.turns.to_vec(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Malformed("script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ModelError::Timeout.is_retryable());
        assert!(ModelError::Transport("reset".into()).is_retryable());
        assert!(ModelError::http(429, "slow down").is_retryable());
        assert!(ModelError::http(503, "").is_retryable());
        assert!(!ModelError::http(401, "bad key").is_retryable());
        assert!(!ModelError::http(400, "bad request").is_retryable());
        assert!(!ModelError::Cancelled.is_retryable());
        assert!(!ModelError::Malformed("no choices".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_scripted_client_serves_in_order_and_records() {
        let client = ScriptedModelClient::from_results(vec![
            Ok("first".to_string()),
            Err(ModelError::Timeout),
        ]);
        let sampling = SamplingParams::default();
        let turns = vec![ConversationTurn::user("hello")];
        let request = CompletionRequest {
            system_prompt: "sys",
            turns: &turns,
            sampling: &sampling,
        };

        assert_eq!(client.complete(&request).await.unwrap(), "first");
        assert_eq!(client.complete(&request).await, Err(ModelError::Timeout));
        assert_eq!(
            client.complete(&request).await,
            Err(ModelError::Malformed("script exhausted".to_string()))
        );

        let recorded = client.requests().await;
        assert_eq!(recorded.len(), 3);
        assert_eq!(recorded[0].system_prompt, "sys");
        assert_eq!(recorded[0].turns, turns);
    }
}
