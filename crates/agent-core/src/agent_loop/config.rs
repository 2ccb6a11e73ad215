//! Configuration for the phone agent loop.

use std::time::Duration;

use droidpilot_core_types::UiDetail;
use perceiver_visual::ObservationCacheConfig;
use serde::{Deserialize, Serialize};

use crate::action::ActionName;
use crate::guardrails::DEFAULT_SENSITIVE_KEYWORDS;
use crate::history::HistoryBudget;
use crate::llm_provider::SamplingParams;
use crate::retry::RetryPolicy;

/// Settle time applied after an action, by action category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ActionDelays {
    /// Default: 1500
    pub launch_ms: u64,
    /// Also used for long presses.
    /// Default: 800
    pub swipe_ms: u64,
    /// Taps, double taps and typing.
    /// Default: 500
    pub tap_ms: u64,
    /// Default: 300
    pub wait_ms: u64,
    /// Default: 200
    pub default_ms: u64,
}

impl Default for ActionDelays {
    fn default() -> Self {
        Self {
            launch_ms: 1_500,
            swipe_ms: 800,
            tap_ms: 500,
            wait_ms: 300,
            default_ms: 200,
        }
    }
}

impl ActionDelays {
    /// No settle time at all; used by tests and dry runs.
    pub fn none() -> Self {
        Self {
            launch_ms: 0,
            swipe_ms: 0,
            tap_ms: 0,
            wait_ms: 0,
            default_ms: 0,
        }
    }

    pub fn for_action(&self, action: &ActionName) -> Duration {
        let ms = match action {
            ActionName::Launch => self.launch_ms,
            ActionName::Swipe | ActionName::LongPress => self.swipe_ms,
            ActionName::Tap | ActionName::DoubleTap | ActionName::Type => self.tap_ms,
            ActionName::Wait => self.wait_ms,
            _ => self.default_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Configuration for the observe-decide-act loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLoopConfig {
    /// Maximum iterations before giving up.
    /// Default: 100
    pub max_steps: u32,

    /// Repair requests sent when a reply cannot be parsed.
    /// Default: 2
    pub max_parse_repairs: u32,

    /// Repair requests sent when the device rejects an action.
    /// Default: 2
    pub max_action_repairs: u32,

    /// Poll interval while the run is paused.
    /// Default: 250
    pub pause_poll_interval_ms: u64,

    /// Whether screenshots are captured and sent to the model.
    /// Default: true
    pub enable_vision: bool,

    /// Character budget for the UI snapshot text in each user turn.
    /// Default: 6000
    pub ui_char_budget: usize,

    /// Share of the budget kept from the start of the snapshot.
    /// Default: 0.75
    pub ui_head_fraction: f64,

    /// Minimum share of the budget kept from the end of the snapshot.
    /// Default: 0.2
    pub ui_min_tail_fraction: f64,

    /// Node limit passed to the UI dump.
    /// Default: 300
    pub ui_max_nodes: usize,

    /// Default: compact
    pub ui_detail: UiDetail,

    /// How long a fused tap+type waits for the keyboard.
    /// Default: 1500
    pub keyboard_timeout_ms: u64,

    /// Duration of a `Wait` action without an explicit duration.
    /// Default: 1000
    pub default_wait_ms: u64,

    /// Hold time of a long press without an explicit duration.
    /// Default: 800
    pub long_press_ms: u64,

    /// Swipe duration without an explicit duration.
    /// Default: 300
    pub swipe_duration_ms: u64,

    /// Error text in failed results is cut to this many characters.
    /// Default: 300
    pub max_error_chars: usize,

    /// Words in the UI snapshot that force a take-over for taps and typing.
    pub sensitive_keywords: Vec<String>,

    pub delays: ActionDelays,
    pub history: HistoryBudget,
    pub retry: RetryPolicy,
    pub sampling: SamplingParams,
    pub observation: ObservationCacheConfig,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            max_parse_repairs: 2,
            max_action_repairs: 2,
            pause_poll_interval_ms: 250,
            enable_vision: true,
            ui_char_budget: 6_000,
            ui_head_fraction: 0.75,
            ui_min_tail_fraction: 0.2,
            ui_max_nodes: 300,
            ui_detail: UiDetail::Compact,
            keyboard_timeout_ms: 1_500,
            default_wait_ms: 1_000,
            long_press_ms: 800,
            swipe_duration_ms: 300,
            max_error_chars: 300,
            sensitive_keywords: DEFAULT_SENSITIVE_KEYWORDS
                .iter()
                .map(|keyword| keyword.to_string())
                .collect(),
            delays: ActionDelays::default(),
            history: HistoryBudget::default(),
            retry: RetryPolicy::default(),
            sampling: SamplingParams::default(),
            observation: ObservationCacheConfig::default(),
        }
    }
}

impl AgentLoopConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a minimal config for testing: few steps, no settle delays,
    /// no vision and a single model attempt.
    pub fn minimal() -> Self {
        Self {
            max_steps: 10,
            pause_poll_interval_ms: 10,
            enable_vision: false,
            ui_char_budget: 2_000,
            keyboard_timeout_ms: 100,
            default_wait_ms: 10,
            long_press_ms: 10,
            swipe_duration_ms: 10,
            delays: ActionDelays::none(),
            retry: RetryPolicy::none(),
            ..Self::default()
        }
    }

    /// Builder: set max steps.
    pub fn max_steps(mut self, steps: u32) -> Self {
        self.max_steps = steps;
        self
    }

    /// Builder: set vision mode.
    pub fn vision(mut self, enabled: bool) -> Self {
        self.enable_vision = enabled;
        self
    }

    /// Builder: set the parse repair budget.
    pub fn parse_repairs(mut self, count: u32) -> Self {
        self.max_parse_repairs = count;
        self
    }

    /// Builder: set the execution repair budget.
    pub fn action_repairs(mut self, count: u32) -> Self {
        self.max_action_repairs = count;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn history_budget(mut self, history: HistoryBudget) -> Self {
        self.history = history;
        self
    }

    pub fn action_delays(mut self, delays: ActionDelays) -> Self {
        self.delays = delays;
        self
    }

    pub fn pause_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pause_poll_interval_ms)
    }

    pub fn keyboard_timeout(&self) -> Duration {
        Duration::from_millis(self.keyboard_timeout_ms)
    }
}
