///! Data models for the observation cache
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache key: a screenshot is reusable only while the foreground app and the
/// last window-change stamp are both unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub foreground_app: String,
    pub window_stamp: u64,
}

impl CacheKey {
    pub fn new(foreground_app: impl Into<String>, window_stamp: u64) -> Self {
        Self {
            foreground_app: foreground_app.into(),
            window_stamp,
        }
    }
}

/// Tuning for screenshot caching and capture throttling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationCacheConfig {
    /// Hard upper bound on the age of a cached screenshot.
    /// Default: 3000
    pub ttl_ms: u64,

    /// Maximum number of cached screenshots.
    /// Default: 8
    pub max_entries: usize,

    /// Minimum interval between two real device captures.
    /// Default: 500
    pub min_capture_interval_ms: u64,
}

impl Default for ObservationCacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 3_000,
            max_entries: 8,
            min_capture_interval_ms: 500,
        }
    }
}

impl ObservationCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn min_capture_interval(&self) -> Duration {
        Duration::from_millis(self.min_capture_interval_ms)
    }
}

/// Counters describing how observation requests were served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationStats {
    /// Requests answered from the cache.
    pub cache_hits: u64,
    /// Real device captures that succeeded.
    pub captures: u64,
    /// Device captures that failed.
    pub capture_failures: u64,
    /// Requests refused by the throttle with no cache fallback.
    pub throttled: u64,
}
