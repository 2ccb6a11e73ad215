///! Throttled, cached access to device screenshots
use crate::cache::ScreenshotCache;
use crate::models::{CacheKey, ObservationCacheConfig, ObservationStats};
use crate::throttle::CaptureThrottle;
use droidpilot_core_types::{DeviceAutomation, ScreenCapture};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

struct ObservationState {
    cache: ScreenshotCache,
    throttle: CaptureThrottle,
    stats: ObservationStats,
}

/// Screenshot front-end combining a TTL/LRU cache with a capture throttle.
///
/// The state lock is held across the device capture, so concurrent callers
/// sharing one instance are serialized and the throttle holds for them too.
pub struct ObservationCache {
    config: ObservationCacheConfig,
    state: Mutex<ObservationState>,
}

impl ObservationCache {
    pub fn new(config: ObservationCacheConfig) -> Self {
        let state = ObservationState {
            cache: ScreenshotCache::new(config.max_entries, config.ttl()),
            throttle: CaptureThrottle::new(config.min_capture_interval()),
            stats: ObservationStats::default(),
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &ObservationCacheConfig {
        &self.config
    }

    /// Return a screenshot for the current screen, capturing only when needed.
    ///
    /// `None` means the step proceeds without an image: either the throttle
    /// refused and nothing usable was cached, or the capture itself failed.
    pub async fn get_or_capture(&self, device: &dyn DeviceAutomation) -> Option<Arc<ScreenCapture>> {
        let foreground_app = match device.foreground_app().await {
            Ok(app) => app,
            Err(err) => {
                warn!(target: "perceiver_visual", %err, "foreground app unavailable");
                String::new()
            }
        };
        let key = CacheKey::new(foreground_app, device.last_window_change());

        let mut state = self.state.lock().await;
        let now = Instant::now();

        if !state.throttle.allows(now) {
            return match state.cache.get(&key, now) {
                Some(hit) => {
                    state.stats.cache_hits += 1;
                    debug!(target: "perceiver_visual", app = %key.foreground_app, "throttled; serving cached screenshot");
                    Some(hit)
                }
                None => {
                    state.stats.throttled += 1;
                    debug!(
                        target: "perceiver_visual",
                        wait_ms = state.throttle.remaining(now).as_millis() as u64,
                        "throttled with no cached screenshot"
                    );
                    None
                }
            };
        }

        if let Some(hit) = state.cache.get(&key, now) {
            state.stats.cache_hits += 1;
            return Some(hit);
        }

        match device.capture_screenshot().await {
            Ok(capture) => {
                let captured_at = Instant::now();
                let capture = Arc::new(capture);
                state.throttle.record_capture(captured_at);
                state.cache.put(key, capture.clone(), captured_at);
                state.stats.captures += 1;
                debug!(
                    target: "perceiver_visual",
                    width = capture.width,
                    height = capture.height,
                    cached = state.cache.len(),
                    "captured screenshot"
                );
                Some(capture)
            }
            Err(err) => {
                state.stats.capture_failures += 1;
                warn!(target: "perceiver_visual", %err, "screenshot capture failed; continuing without image");
                None
            }
        }
    }

    /// Reset cache and throttle. Called at the start of every run.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.cache.clear();
        state.throttle.reset();
        state.stats = ObservationStats::default();
    }

    pub async fn stats(&self) -> ObservationStats {
        self.state.lock().await.stats
    }

    pub async fn cached_entries(&self) -> usize {
        self.state.lock().await.cache.len()
    }
}

impl Default for ObservationCache {
    fn default() -> Self {
        Self::new(ObservationCacheConfig::default())
    }
}
