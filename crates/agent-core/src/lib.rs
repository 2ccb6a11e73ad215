//! Agent core for DroidPilot.
//!
//! Provides the action protocol parser, conversation history management,
//! retry policy and the observe-decide-act loop that drives a phone toward
//! a natural-language goal.

pub mod action;
pub mod agent_loop;
pub mod errors;
pub mod guardrails;
pub mod history;
pub mod llm_provider;
pub mod model;
pub mod retry;

pub use action::{
    estimate_total_steps, parse_action, split_thinking_and_answer, ActionFields, ActionKind,
    ActionName, ParsedAction,
};
pub use agent_loop::{
    AgentControl, AgentLoopConfig, AgentLoopController, AgentLoopResult, AgentLoopStatus,
};
pub use errors::AgentError;
pub use guardrails::SensitiveScreenGuard;
pub use history::{ConversationHistory, HistoryBudget};
pub use llm_provider::{
    CompletionRequest, ModelClient, ModelError, SamplingParams, ScriptedModelClient,
};
pub use model::{ContentPart, ConversationRole, ConversationTurn, TurnContent};
pub use retry::{call_with_retry, RetryPolicy};
