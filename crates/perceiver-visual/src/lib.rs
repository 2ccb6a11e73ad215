//! Visual Perceiver - screenshot caching and capture throttling for DroidPilot
//!
//! Screenshots are the most expensive observation the agent makes. This
//! crate bounds how often and how redundantly the device is asked for one:
//! - TTL + LRU cache keyed on foreground app and window-change stamp
//! - Minimum interval between real captures

pub mod cache;
pub mod models;
pub mod observation;
pub mod throttle;

// Re-exports
pub use cache::ScreenshotCache;
pub use models::*;
pub use observation::ObservationCache;
pub use throttle::CaptureThrottle;
