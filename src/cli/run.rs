use std::path::PathBuf;
use std::sync::Arc;

use agent_core::{
    AgentControl, AgentLoopController, AgentLoopResult, ModelClient, ScriptedModelClient,
};
use anyhow::{Context, Result};
use clap::Args;
use tokio::signal;
use tracing::{info, warn};

use crate::cli::context::CliContext;
use crate::device::DryRunDevice;
use crate::llm::{OpenAiConfig, OpenAiModelClient};

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Natural-language goal for the agent
    #[arg(short, long)]
    pub goal: String,

    /// Replay model replies from a file instead of calling the model
    /// endpoint. Replies are separated by lines containing only `---`.
    #[arg(long, value_name = "FILE")]
    pub replies: Option<PathBuf>,

    /// Override the configured step limit
    #[arg(long)]
    pub max_steps: Option<u32>,

    /// Extra instructions appended to the system prompt
    #[arg(long)]
    pub instructions: Option<String>,

    /// Pretty-print the JSON result
    #[arg(long)]
    pub pretty: bool,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let mut agent_config = config.agent.clone();
    if let Some(steps) = args.max_steps {
        agent_config.max_steps = steps.max(1);
    }

    let model: Arc<dyn ModelClient> = match &args.replies {
        Some(path) => {
            let script = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading replies from {}", path.display()))?;
            let replies = split_replies(&script);
            info!(count = replies.len(), path = %path.display(), "replaying scripted model replies");
            Arc::new(ScriptedModelClient::new(replies))
        }
        None => {
            let openai = OpenAiConfig::from_model_config(&config.model);
            if openai.api_key.is_none() {
                warn!(
                    env = %config.model.api_key_env,
                    "no API key found; sending unauthenticated requests"
                );
            }
            Arc::new(OpenAiModelClient::new(openai).context("creating model client")?)
        }
    };

    let device = DryRunDevice::new(&config.device);
    let control = AgentControl::new();
    let mut controller = AgentLoopController::new(agent_config).with_control(control.clone());
    if let Some(instructions) = args.instructions.as_deref() {
        controller = controller.with_custom_instructions(instructions);
    }

    let interrupt = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling run");
            control.cancel();
        }
    });

    let result = controller.run(&args.goal, &device, model.as_ref()).await;
    interrupt.abort();

    let stats = controller.observations().stats().await;
    info!(
        cache_hits = stats.cache_hits,
        captures = stats.captures,
        capture_failures = stats.capture_failures,
        throttled = stats.throttled,
        "observation cache statistics"
    );

    print_result(&result, args.pretty)?;
    if !result.is_success() {
        info!(status = ?result.status, "run did not complete");
    }
    Ok(())
}

fn print_result(result: &AgentLoopResult, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{rendered}");
    Ok(())
}

/// Split a replies script on `---` separator lines, dropping empty blocks.
pub fn split_replies(script: &str) -> Vec<String> {
    let mut replies = Vec::new();
    let mut current = Vec::new();
    for line in script.lines() {
        if line.trim() == "---" {
            replies.push(current.join("\n"));
            current.clear();
        } else {
            current.push(line);
        }
    }
    replies.push(current.join("\n"));
    replies
        .into_iter()
        .map(|reply| reply.trim().to_string())
        .filter(|reply| !reply.is_empty())
        .collect()
}
