use droidpilot_core_types::DeviceError;
use thiserror::Error;

use crate::llm_provider::ModelError;

/// Errors emitted by the agent-core crate.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Raised when a run request is malformed or missing required fields.
    #[error("invalid agent request: {0}")]
    InvalidRequest(String),

    /// The model could not be reached, or kept failing after retries.
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),

    /// The model reply did not match the action grammar, even after repair.
    #[error("could not parse an action from model output: {raw}")]
    Parse { raw: String },

    /// The device could not carry out an action, even after repair.
    #[error("action {action} failed: {reason}")]
    Execution { action: String, reason: String },

    /// The model or a sensitive-content check asked for a human.
    #[error("human take-over requested: {0}")]
    TakeOver(String),

    /// The step budget ran out before the model finished.
    #[error("reached maximum step limit: {0}")]
    StepLimit(u32),

    /// The run was cancelled from outside.
    #[error("run cancelled")]
    Cancelled,
}

impl AgentError {
    /// Helper for wrapping static string errors.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn parse(raw: impl Into<String>) -> Self {
        Self::Parse { raw: raw.into() }
    }

    pub fn execution(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Execution {
            action: action.into(),
            reason: reason.into(),
        }
    }

    pub fn device(action: impl Into<String>, err: DeviceError) -> Self {
        Self::execution(action, err.to_string())
    }

    pub fn take_over(message: impl Into<String>) -> Self {
        Self::TakeOver(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Model(ModelError::Cancelled))
    }
}
