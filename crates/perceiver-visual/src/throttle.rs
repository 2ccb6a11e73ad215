///! Minimum-interval gate in front of the device screenshot call
use std::time::Duration;
use tokio::time::Instant;

/// Tracks the last successful capture and refuses captures that come too soon.
#[derive(Debug, Clone)]
pub struct CaptureThrottle {
    min_interval: Duration,
    last_capture: Option<Instant>,
}

impl CaptureThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_capture: None,
        }
    }

    /// Whether a real capture may be attempted at `now`.
    pub fn allows(&self, now: Instant) -> bool {
        match self.last_capture {
            Some(last) => now >= last + self.min_interval,
            None => true,
        }
    }

    /// Time left until the next capture is allowed.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_capture {
            Some(last) => (last + self.min_interval).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    pub fn record_capture(&mut self, at: Instant) {
        self.last_capture = Some(at);
    }

    pub fn reset(&mut self) {
        self.last_capture = None;
    }
}
