pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod parse;
pub mod run;
pub mod runtime;

pub use app::run;
pub use parse::{parse_reply, ParseReport};
pub use run::split_replies;
