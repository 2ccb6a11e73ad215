//! Agent Loop (observe-decide-act) for driving a phone.
//!
//! The model is consulted at each step to decide the single next action
//! based on the current screen.
//!
//! # Architecture
//!
//! ```text
//! while steps < max:
//!     observation = observe()          // screenshot + UI dump, joined
//!     history.trim(); history.push(observation)
//!     reply = model.complete(history)  // with retry/backoff
//!     action = parse(reply)            // with repair requests
//!     if action is finish: break
//!     execute(action)                  // with repair requests
//!     settle()
//! ```
//!
//! # Key Components
//!
//! - [`AgentLoopConfig`]: Budgets, delays and sub-configs for the loop
//! - [`StateFormatter`]: Observation to user turn
//! - [`ActionExecutor`]: Parsed action to device calls
//! - [`AgentLoopController`]: Main loop orchestrator

pub mod config;
pub mod controller;
pub mod executor;
pub mod prompt;
pub mod state_formatter;
pub mod types;

pub use config::{ActionDelays, AgentLoopConfig};
pub use controller::AgentLoopController;
pub use executor::{ActionExecutor, ExecutionMode, TapContext};
pub use prompt::{format_execution_repair, format_parse_repair, format_system_prompt};
pub use state_formatter::{Observation, StateFormatter};
pub use types::{AgentControl, AgentLoopResult, AgentLoopStatus, RunProgress, StepRecord};
