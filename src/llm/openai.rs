use agent_core::{
    CompletionRequest, ContentPart, ConversationTurn, ModelClient, ModelError, TurnContent,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::ModelConfig;

/// Longest error body kept in a [`ModelError::Http`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn from_model_config(config: &ModelConfig) -> Self {
        Self {
            api_key: config.api_key(),
            model: config.model.clone(),
            api_base: config.api_base.clone(),
            timeout: config.timeout(),
        }
    }
}

/// [`ModelClient`] for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiModelClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiModelClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ModelError::Transport(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ModelClient for OpenAiModelClient {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ModelError> {
        let body = build_request_body(&self.config.model, request);
        debug!(
            target: "openai",
            model = %self.config.model,
            messages = body.messages.len(),
            "sending chat completion request"
        );

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            return Err(ModelError::http(status.as_u16(), truncate(&text)));
        }

        let text = response.text().await.map_err(map_transport_error)?;
        parse_response(&text)
    }
}

fn map_transport_error(err: reqwest::Error) -> ModelError {
    if err.is_timeout() {
        ModelError::Timeout
    } else if err.is_decode() {
        ModelError::Malformed(err.to_string())
    } else {
        ModelError::Transport(err.to_string())
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((offset, _)) => format!("{}…", &text[..offset]),
        None => text.to_string(),
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: ChatMessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatMessageContent {
    Text(String),
    Parts(Vec<ChatMessagePart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatMessagePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

fn build_request_body(model: &str, request: &CompletionRequest<'_>) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(request.turns.len() + 1);
    messages.push(ChatMessage {
        role: "system",
        content: ChatMessageContent::Text(request.system_prompt.to_string()),
    });
    messages.extend(request.turns.iter().map(chat_message));

    ChatCompletionRequest {
        model: model.to_string(),
        temperature: request.sampling.temperature,
        top_p: request.sampling.top_p,
        frequency_penalty: request.sampling.frequency_penalty,
        max_tokens: request.sampling.max_tokens,
        messages,
    }
}

fn chat_message(turn: &ConversationTurn) -> ChatMessage {
    let content = match &turn.content {
        TurnContent::Text(text) => ChatMessageContent::Text(text.clone()),
        TurnContent::Parts(parts) => ChatMessageContent::Parts(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => ChatMessagePart::Text { text: text.clone() },
                    ContentPart::Image { data_url } => ChatMessagePart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_url.clone(),
                        },
                    },
                })
                .collect(),
        ),
    };
    ChatMessage {
        role: turn.role.as_str(),
        content,
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<ChatCompletionContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

impl ChatCompletionContent {
    fn as_text(&self) -> Option<String> {
        match self {
            ChatCompletionContent::Text(value) => Some(value.clone()),
            ChatCompletionContent::Parts(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|part| part.text.as_ref())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

fn parse_response(body: &str) -> Result<String, ModelError> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|err| ModelError::Malformed(format!("openai response invalid: {err}")))?;
    response
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_ref())
        .and_then(ChatCompletionContent::as_text)
        .ok_or_else(|| ModelError::Malformed("openai response missing content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::SamplingParams;
    use serde_json::{json, Value};

    #[test]
    fn test_request_body_carries_sampling_and_images() {
        let turns = vec![
            ConversationTurn::user("Task: open settings"),
            ConversationTurn::assistant(r#"do(action="Home")"#),
            ConversationTurn::user_parts(vec![
                ContentPart::text("{}"),
                ContentPart::png(&[1, 2, 3]),
            ]),
        ];
        let sampling = SamplingParams::default();
        let request = CompletionRequest {
            system_prompt: "system",
            turns: &turns,
            sampling: &sampling,
        };

        let body: Value = serde_json::to_value(build_request_body("gpt-4o", &request)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 3000);
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "system"}));
        assert_eq!(body["messages"][2]["role"], "assistant");

        let parts = body["messages"][3]["content"].as_array().unwrap();
        assert_eq!(parts[0], json!({"type": "text", "text": "{}"}));
        assert_eq!(parts[1]["type"], "image_url");
        assert!(parts[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_parse_response_text_and_parts() {
        let text = r#"{"choices":[{"message":{"role":"assistant","content":"finish(message=\"ok\")"}}]}"#;
        assert_eq!(parse_response(text).unwrap(), r#"finish(message="ok")"#);

        let parts = r#"{"choices":[{"message":{"content":[{"type":"text","text":"a"},{"type":"text","text":"b"}]}}]}"#;
        assert_eq!(parse_response(parts).unwrap(), "a\nb");
    }

    #[test]
    fn test_parse_response_rejects_missing_content() {
        let empty = r#"{"choices":[]}"#;
        assert!(matches!(parse_response(empty), Err(ModelError::Malformed(_))));
        assert!(matches!(
            parse_response("<html>bad gateway</html>"),
            Err(ModelError::Malformed(_))
        ));
    }

    #[test]
    fn test_error_bodies_are_truncated() {
        let long = "x".repeat(MAX_ERROR_BODY + 10);
        assert_eq!(truncate(&long).chars().count(), MAX_ERROR_BODY + 1);
        assert_eq!(truncate("short"), "short");
    }
}
