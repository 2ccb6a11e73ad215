use std::path::PathBuf;

use agent_core::{estimate_total_steps, parse_action, split_thinking_and_answer, ParsedAction};
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::io::AsyncReadExt;

#[derive(Args, Clone, Debug)]
pub struct ParseArgs {
    /// File containing the model reply, or `-` for stdin
    #[arg(value_name = "FILE", default_value = "-")]
    pub input: PathBuf,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Debug, Serialize)]
pub struct ParseReport {
    pub thinking: Option<String>,
    pub answer: String,
    pub estimated_total_steps: u32,
    pub action: ParsedAction,
}

/// Run a raw model reply through the same pipeline the agent loop uses.
pub fn parse_reply(reply: &str) -> ParseReport {
    let (thinking, answer) = split_thinking_and_answer(reply);
    let estimated_total_steps = thinking.as_deref().map_or(0, estimate_total_steps);
    let action = parse_action(&answer);
    ParseReport {
        thinking,
        answer,
        estimated_total_steps,
        action,
    }
}

pub async fn cmd_parse(args: ParseArgs) -> Result<()> {
    let reply = if args.input.as_os_str() == "-" {
        let mut buffer = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buffer)
            .await
            .context("reading reply from stdin")?;
        buffer
    } else {
        tokio::fs::read_to_string(&args.input)
            .await
            .with_context(|| format!("reading {}", args.input.display()))?
    };

    let report = parse_reply(&reply);
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{rendered}");
    Ok(())
}
