//! DroidPilot library
//!
//! Exposes the CLI building blocks for integration testing

pub mod cli;
pub mod config;
pub mod device;
pub mod llm;

// Re-export commonly used types for external use
pub use config::{DeviceConfig, DroidPilotConfig, ModelConfig};
pub use device::DryRunDevice;
pub use llm::{OpenAiConfig, OpenAiModelClient};
