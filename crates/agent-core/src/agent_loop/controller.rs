//! Agent Loop Controller - main orchestration for the observe-decide-act cycle.
//!
//! Each step captures the screen, asks the model for one action, parses and
//! executes it, then lets the UI settle before the next observation.

use std::sync::Arc;
use std::time::Duration;

use droidpilot_core_types::{DeviceAutomation, RunId};
use perceiver_visual::ObservationCache;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::AgentLoopConfig;
use super::executor::{ActionExecutor, ExecutionMode, TapContext};
use super::prompt::{format_execution_repair, format_parse_repair, format_system_prompt};
use super::state_formatter::{Observation, StateFormatter};
use super::types::{AgentControl, AgentLoopResult, RunProgress, StepRecord};
use crate::action::{
    estimate_total_steps, parse_action, split_thinking_and_answer, ActionKind, ActionName,
    ParsedAction,
};
use crate::errors::AgentError;
use crate::guardrails::SensitiveScreenGuard;
use crate::history::ConversationHistory;
use crate::llm_provider::{CompletionRequest, ModelClient};
use crate::model::ConversationTurn;
use crate::retry::call_with_retry;

/// Per-run mutable state, discarded when the run ends.
#[derive(Debug, Default)]
struct RunState {
    step: u32,
    /// Tap executed on the previous step, for tap+type fusion.
    last_tap: Option<TapContext>,
    estimated_total_steps: Option<u32>,
    records: Vec<StepRecord>,
}

/// A model reply split and parsed.
struct Decision {
    thinking: Option<String>,
    action: ParsedAction,
    repairs: u32,
}

/// How a step ended.
enum StepOutcome {
    Finished(String),
    Continue,
}

/// Controller for the phone agent loop.
///
/// One controller runs one task at a time; [`AgentControl`] pauses or
/// cancels it from another task.
pub struct AgentLoopController {
    config: AgentLoopConfig,
    system_prompt: String,
    formatter: StateFormatter,
    guard: SensitiveScreenGuard,
    observations: Arc<ObservationCache>,
    control: AgentControl,
    progress: Mutex<RunProgress>,
}

impl AgentLoopController {
    /// Create a new controller with the given configuration.
    pub fn new(config: AgentLoopConfig) -> Self {
        let observations = Arc::new(ObservationCache::new(config.observation.clone()));
        Self {
            system_prompt: format_system_prompt(None),
            formatter: StateFormatter::new(&config),
            guard: SensitiveScreenGuard::new(&config.sensitive_keywords),
            observations,
            control: AgentControl::new(),
            progress: Mutex::new(RunProgress::default()),
            config,
        }
    }

    /// Create a controller with default configuration.
    pub fn default_config() -> Self {
        Self::new(AgentLoopConfig::default())
    }

    /// Share an observation cache with other controllers.
    pub fn with_observation_cache(mut self, observations: Arc<ObservationCache>) -> Self {
        self.observations = observations;
        self
    }

    pub fn with_custom_instructions(mut self, instructions: &str) -> Self {
        self.system_prompt = format_system_prompt(Some(instructions));
        self
    }

    pub fn with_control(mut self, control: AgentControl) -> Self {
        self.control = control;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &AgentLoopConfig {
        &self.config
    }

    /// Handle for pausing, resuming and cancelling runs.
    pub fn control(&self) -> AgentControl {
        self.control.clone()
    }

    pub fn observations(&self) -> &Arc<ObservationCache> {
        &self.observations
    }

    pub async fn progress(&self) -> RunProgress {
        self.progress.lock().await.clone()
    }

    /// Drive the device toward `goal` until the model finishes, a stop
    /// condition is hit or the run is cancelled.
    pub async fn run(
        &self,
        goal: &str,
        device: &dyn DeviceAutomation,
        model: &dyn ModelClient,
    ) -> AgentLoopResult {
        let started = Instant::now();
        {
            let mut progress = self.progress.lock().await;
            if progress.running {
                return AgentLoopResult::failed("a run is already in progress".to_string(), 0);
            }
            *progress = RunProgress {
                running: true,
                ..RunProgress::default()
            };
        }

        let run_id = RunId::new();
        info!(
            target: "agent_loop",
            run_id = %run_id,
            goal,
            max_steps = self.config.max_steps,
            "starting agent run"
        );
        self.observations.clear().await;

        let mut state = RunState::default();
        let outcome = if goal.trim().is_empty() {
            Err(AgentError::invalid_request("goal must not be empty"))
        } else {
            self.drive(goal.trim(), device, model, &mut state).await
        };

        let result = match outcome {
            Ok(message) => AgentLoopResult::completed(message, state.step),
            Err(err) => AgentLoopResult::from_error(&err, state.step, self.config.max_error_chars),
        }
        .with_estimate(state.estimated_total_steps)
        .with_history(state.records)
        .with_run_id(run_id.clone())
        .with_elapsed_ms(started.elapsed().as_millis() as u64);

        self.progress.lock().await.running = false;
        info!(
            target: "agent_loop",
            run_id = %run_id,
            status = ?result.status,
            steps = result.steps_taken,
            elapsed_ms = result.total_time_ms,
            message = %result.message,
            "agent run finished"
        );
        result
    }

    async fn drive(
        &self,
        goal: &str,
        device: &dyn DeviceAutomation,
        model: &dyn ModelClient,
        state: &mut RunState,
    ) -> Result<String, AgentError> {
        let mut history = ConversationHistory::new(self.system_prompt.clone());

        while state.step < self.config.max_steps {
            self.wait_while_paused().await?;
            if self.control.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            state.step += 1;
            self.progress.lock().await.step = state.step;

            match self.step(goal, device, model, &mut history, state).await? {
                StepOutcome::Finished(message) => return Ok(message),
                StepOutcome::Continue => {}
            }
        }
        Err(AgentError::StepLimit(self.config.max_steps))
    }

    async fn step(
        &self,
        goal: &str,
        device: &dyn DeviceAutomation,
        model: &dyn ModelClient,
        history: &mut ConversationHistory,
        state: &mut RunState,
    ) -> Result<StepOutcome, AgentError> {
        let step = state.step;
        let observation = self.observe(device).await;
        debug!(
            target: "agent_loop",
            step,
            app = %observation.current_app,
            ui_chars = observation.ui_snapshot.len(),
            screenshot = observation.screenshot.is_some(),
            "observed screen"
        );

        let turn = self
            .formatter
            .format_user_turn((step == 1).then_some(goal), &observation);
        history.trim(&self.config.history);
        history.push(turn);

        let decision = self.decide(model, history).await?;
        if step == 1 && state.estimated_total_steps.is_none() {
            let estimate = decision.thinking.as_deref().map(estimate_total_steps);
            if let Some(estimate) = estimate.filter(|estimate| *estimate > 0) {
                debug!(target: "agent_loop", estimate, "estimated total steps");
                state.estimated_total_steps = Some(estimate);
                self.progress.lock().await.estimated_total_steps = Some(estimate);
            }
        }

        let mut repairs = decision.repairs;
        let mut action = decision.action;
        let mut action_repairs = 0u32;
        let executor = ActionExecutor::new(device, &self.config, self.control.cancellation_token());

        loop {
            match &action.kind {
                ActionKind::Finish => return Ok(StepOutcome::Finished(action.message().to_string())),
                ActionKind::Unknown { .. } => return Err(AgentError::parse(action.raw.clone())),
                ActionKind::Do { action: name } if name.requires_human() => {
                    let message = match action.message() {
                        "" => format!("model requested {name}"),
                        message => message.to_string(),
                    };
                    return Err(AgentError::take_over(message));
                }
                ActionKind::Do { .. } => {}
            }
            if let Some(reason) = self.guard.check(&action, &observation.ui_snapshot) {
                warn!(target: "agent_loop", step, %reason, "sensitive screen, handing over");
                return Err(AgentError::take_over(reason));
            }

            let is_type = matches!(action.action_name(), Some(ActionName::Type));
            let previous_tap = state.last_tap.as_ref().filter(|_| is_type);
            let window_stamp = device.last_window_change();
            match executor.execute(&action, previous_tap).await {
                Ok(mode) => {
                    info!(target: "agent_loop", step, action = %action.raw, ?mode, "action executed");
                    state.last_tap = action
                        .action_name()
                        .filter(|name| **name == ActionName::Tap)
                        .map(|_| TapContext {
                            action: action.clone(),
                            window_stamp,
                        });
                    state.records.push(StepRecord {
                        step,
                        thinking: decision.thinking.clone(),
                        action: action.raw.clone(),
                        fused: mode == ExecutionMode::FusedTapType,
                        repairs: repairs + action_repairs,
                    });
                    self.progress.lock().await.last_action = Some(action.raw.clone());
                    break;
                }
                Err(err) if err.is_cancelled() || matches!(err, AgentError::TakeOver(_)) => {
                    return Err(err)
                }
                Err(err) => {
                    if action_repairs >= self.config.max_action_repairs {
                        return Err(err);
                    }
                    action_repairs += 1;
                    warn!(
                        target: "agent_loop",
                        step,
                        attempt = action_repairs,
                        action = %action.raw,
                        error = %err,
                        "action failed, asking model for a repair"
                    );
                    state.last_tap = None;
                    history.push(ConversationTurn::user(format_execution_repair(
                        &action,
                        &err.to_string(),
                    )));
                    let repaired = self.decide(model, history).await?;
                    repairs += repaired.repairs;
                    action = repaired.action;
                }
            }
        }

        let delay = action
            .action_name()
            .map(|name| self.config.delays.for_action(name))
            .unwrap_or_default();
        self.sleep(delay).await?;
        Ok(StepOutcome::Continue)
    }

    /// Capture the screenshot and dump the UI concurrently.
    async fn observe(&self, device: &dyn DeviceAutomation) -> Observation {
        let screenshot = async {
            if self.config.enable_vision {
                self.observations.get_or_capture(device).await
            } else {
                None
            }
        };
        let ui = device.dump_ui_snapshot(self.config.ui_max_nodes, self.config.ui_detail);
        let app = device.foreground_app();
        let (screenshot, ui, app) = tokio::join!(screenshot, ui, app);

        Observation {
            current_app: app.unwrap_or_else(|err| {
                warn!(target: "agent_loop", %err, "foreground app unavailable");
                String::new()
            }),
            ui_snapshot: ui.unwrap_or_else(|err| {
                warn!(target: "agent_loop", %err, "ui snapshot unavailable");
                String::new()
            }),
            screenshot,
        }
    }

    /// Ask the model for the next action, repairing unparsable replies.
    async fn decide(
        &self,
        model: &dyn ModelClient,
        history: &mut ConversationHistory,
    ) -> Result<Decision, AgentError> {
        let reply = self.complete(model, history).await?;
        history.push(ConversationTurn::assistant(reply.clone()));
        let (thinking, answer) = split_thinking_and_answer(&reply);
        let mut action = parse_action(&answer);

        let mut repairs = 0u32;
        while action.is_unknown() && repairs < self.config.max_parse_repairs {
            repairs += 1;
            warn!(
                target: "agent_loop",
                attempt = repairs,
                raw = %action.raw,
                "unparsable reply, asking model for a repair"
            );
            history.push(ConversationTurn::user(format_parse_repair(&action)));
            let reply = self.complete(model, history).await?;
            history.push(ConversationTurn::assistant(reply.clone()));
            let (_, answer) = split_thinking_and_answer(&reply);
            action = parse_action(&answer);
        }

        Ok(Decision {
            thinking,
            action,
            repairs,
        })
    }

    async fn complete(
        &self,
        model: &dyn ModelClient,
        history: &ConversationHistory,
    ) -> Result<String, AgentError> {
        let system_prompt = history.system_prompt();
        let request = CompletionRequest {
            system_prompt: &system_prompt,
            turns: history.non_system_turns(),
            sampling: &self.config.sampling,
        };
        let request = &request;
        let reply = call_with_retry(
            &self.config.retry,
            self.control.cancellation_token(),
            move |attempt| {
                debug!(target: "agent_loop", attempt, turns = request.turns.len(), "calling model");
                model.complete(request)
            },
        )
        .await?;
        Ok(reply)
    }

    async fn wait_while_paused(&self) -> Result<(), AgentError> {
        let mut announced = false;
        while self.control.is_paused() {
            if !announced {
                info!(target: "agent_loop", "run paused");
                announced = true;
            }
            self.sleep(self.config.pause_poll_interval()).await?;
        }
        if announced {
            info!(target: "agent_loop", "run resumed");
        }
        Ok(())
    }

    async fn sleep(&self, duration: Duration) -> Result<(), AgentError> {
        let cancel = self.control.cancellation_token();
        if duration.is_zero() {
            return if cancel.is_cancelled() {
                Err(AgentError::Cancelled)
            } else {
                Ok(())
            };
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
