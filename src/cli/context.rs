use std::path::{Path, PathBuf};

use crate::config::DroidPilotConfig;

pub struct CliContext {
    config: DroidPilotConfig,
    config_path: PathBuf,
}

impl CliContext {
    pub fn new(config: DroidPilotConfig, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
        }
    }

    pub fn config(&self) -> &DroidPilotConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
