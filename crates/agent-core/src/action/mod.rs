//! Action text protocol spoken between the model and the executor.
//!
//! The model answers with a function-call-like directive embedded in free
//! text:
//!
//! ```text
//! do(action="Tap", element=[500,120])
//! do(action="Type", text="hello")
//! finish(message="Wi-Fi is on")
//! ```
//!
//! Everything here treats that text as untrusted: parsing never panics and
//! anything that does not match the grammar becomes [`ActionKind::Unknown`].

mod estimate;
mod parser;
mod thinking;
mod types;

pub use estimate::estimate_total_steps;
pub use parser::parse_action;
pub use thinking::split_thinking_and_answer;
pub use types::{ActionFields, ActionKind, ActionName, ParsedAction};
