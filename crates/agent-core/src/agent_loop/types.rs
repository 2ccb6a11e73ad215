//! Core data types for the agent loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use droidpilot_core_types::RunId;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::AgentError;

/// Status of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLoopStatus {
    /// The model replied with `finish(...)`.
    Completed,
    /// Model, parse or execution failure.
    Failed,
    /// A human has to continue (explicit request or sensitive screen).
    TakeOver,
    /// Reached maximum steps without completion.
    MaxStepsReached,
    /// Loop was cancelled from outside.
    Cancelled,
}

/// One executed step, kept for the final report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Raw text of the action that was finally executed.
    pub action: String,
    /// Whether the action ran as a fused tap+type.
    #[serde(default)]
    pub fused: bool,
    /// Parse and execution repair requests spent on this step.
    #[serde(default)]
    pub repairs: u32,
}

/// Result of an agent loop execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLoopResult {
    /// Id of the run, matching the `run_id` field of its log records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    pub status: AgentLoopStatus,
    /// Completion message, or the reason the run stopped.
    pub message: String,
    pub steps_taken: u32,
    /// Progress hint extracted from the first step's reasoning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_total_steps: Option<u32>,
    pub history: Vec<StepRecord>,
    pub total_time_ms: u64,
}

impl AgentLoopResult {
    fn with_status(status: AgentLoopStatus, message: String, steps: u32) -> Self {
        Self {
            run_id: None,
            status,
            message,
            steps_taken: steps,
            estimated_total_steps: None,
            history: Vec::new(),
            total_time_ms: 0,
        }
    }

    /// Create a completed result.
    pub fn completed(message: String, steps: u32) -> Self {
        Self::with_status(AgentLoopStatus::Completed, message, steps)
    }

    /// Create a failed result.
    pub fn failed(message: String, steps: u32) -> Self {
        Self::with_status(AgentLoopStatus::Failed, message, steps)
    }

    pub fn take_over(message: String, steps: u32) -> Self {
        Self::with_status(AgentLoopStatus::TakeOver, message, steps)
    }

    /// Create a max steps reached result.
    pub fn max_steps_reached(steps: u32) -> Self {
        Self::with_status(
            AgentLoopStatus::MaxStepsReached,
            format!("Reached maximum steps limit: {steps}"),
            steps,
        )
    }

    pub fn cancelled(steps: u32) -> Self {
        Self::with_status(
            AgentLoopStatus::Cancelled,
            "Loop cancelled by user".to_string(),
            steps,
        )
    }

    /// Map a run-terminating error onto a result, cutting long error text.
    pub fn from_error(err: &AgentError, steps: u32, max_chars: usize) -> Self {
        match err {
            AgentError::StepLimit(_) => Self::max_steps_reached(steps),
            AgentError::TakeOver(reason) => Self::take_over(truncate_chars(reason, max_chars), steps),
            _ if err.is_cancelled() => Self::cancelled(steps),
            _ => Self::failed(truncate_chars(&err.to_string(), max_chars), steps),
        }
    }

    pub fn with_history(mut self, history: Vec<StepRecord>) -> Self {
        self.history = history;
        self
    }

    pub fn with_estimate(mut self, estimate: Option<u32>) -> Self {
        self.estimated_total_steps = estimate;
        self
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.total_time_ms = elapsed_ms;
        self
    }

    /// Check if the loop completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self.status, AgentLoopStatus::Completed)
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Pause/cancel handle shared between a running loop and its owner.
#[derive(Debug, Clone, Default)]
pub struct AgentControl {
    paused: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl AgentControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Live progress of the current run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunProgress {
    pub running: bool,
    pub step: u32,
    pub estimated_total_steps: Option<u32>,
    pub last_action: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_provider::ModelError;

    #[test]
    fn test_result_constructors() {
        let completed = AgentLoopResult::completed("Done".to_string(), 5);
        assert!(completed.is_success());
        assert_eq!(completed.status, AgentLoopStatus::Completed);

        let failed = AgentLoopResult::failed("Error".to_string(), 3);
        assert!(!failed.is_success());
        assert_eq!(failed.status, AgentLoopStatus::Failed);

        let max_steps = AgentLoopResult::max_steps_reached(100);
        assert!(!max_steps.is_success());
        assert_eq!(max_steps.status, AgentLoopStatus::MaxStepsReached);
    }

    #[test]
    fn test_from_error_maps_statuses() {
        let take_over = AgentLoopResult::from_error(&AgentError::take_over("login"), 2, 100);
        assert_eq!(take_over.status, AgentLoopStatus::TakeOver);
        assert_eq!(take_over.message, "login");

        let cancelled = AgentLoopResult::from_error(&AgentError::Model(ModelError::Cancelled), 1, 100);
        assert_eq!(cancelled.status, AgentLoopStatus::Cancelled);

        let limit = AgentLoopResult::from_error(&AgentError::StepLimit(4), 4, 100);
        assert_eq!(limit.status, AgentLoopStatus::MaxStepsReached);

        let model = AgentLoopResult::from_error(
            &AgentError::Model(ModelError::http(500, "x".repeat(500))),
            1,
            40,
        );
        assert_eq!(model.status, AgentLoopStatus::Failed);
        assert_eq!(model.message.chars().count(), 41);
        assert!(model.message.ends_with('…'));
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("打开设置", 2), "打开…");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn test_control_pause_and_cancel() {
        let control = AgentControl::new();
        let shared = control.clone();
        shared.pause();
        assert!(control.is_paused());
        shared.resume();
        assert!(!control.is_paused());
        shared.cancel();
        assert!(control.is_cancelled());
        assert!(control.cancellation_token().is_cancelled());
    }
}
