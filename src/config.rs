//! Configuration management module
//!
//! `DroidPilotConfig` is read from YAML; every section falls back to its
//! defaults so a partial file (or none at all) is valid.

use std::env;
use std::time::Duration;

use agent_core::AgentLoopConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const ENV_MAX_STEPS: &str = "DROIDPILOT_MAX_STEPS";
pub const ENV_MODEL: &str = "DROIDPILOT_MODEL";
pub const ENV_API_BASE: &str = "DROIDPILOT_API_BASE";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DroidPilotConfig {
    pub agent: AgentLoopConfig,
    pub model: ModelConfig,
    pub device: DeviceConfig,
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub api_base: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_ms: 120_000,
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// API key from the configured environment variable, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

/// Settings for the built-in dry-run device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    /// Foreground app reported before anything is launched.
    pub foreground_app: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            screen_width: 1080,
            screen_height: 2400,
            foreground_app: "com.android.launcher".to_string(),
        }
    }
}

impl DroidPilotConfig {
    /// Apply `DROIDPILOT_*` environment overrides. Unparsable values are
    /// logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = env::var(ENV_MAX_STEPS) {
            match raw.trim().parse::<u32>() {
                Ok(steps) if steps > 0 => {
                    info!(steps, "max_steps overridden from {}", ENV_MAX_STEPS);
                    self.agent.max_steps = steps;
                }
                _ => warn!(value = %raw, "ignoring invalid {}", ENV_MAX_STEPS),
            }
        }

        if let Some(model) = non_empty_var(ENV_MODEL) {
            info!(%model, "model overridden from {}", ENV_MODEL);
            self.model.model = model;
        }

        if let Some(api_base) = non_empty_var(ENV_API_BASE) {
            info!(%api_base, "api_base overridden from {}", ENV_API_BASE);
            self.model.api_base = api_base;
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "agent:\n  max_steps: 7\nmodel:\n  model: glm-4v\n";
        let config: DroidPilotConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.agent.max_steps, 7);
        assert_eq!(config.agent.max_parse_repairs, 2);
        assert_eq!(config.model.model, "glm-4v");
        assert_eq!(config.model.api_base, "https://api.openai.com/v1");
        assert_eq!(config.device, DeviceConfig::default());
    }

    #[test]
    fn test_config_round_trips_through_yaml() {
        let config = DroidPilotConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: DroidPilotConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.agent.max_steps, config.agent.max_steps);
    }
}
