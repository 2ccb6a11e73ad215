//! Shared primitives for the DroidPilot agent crates.
//!
//! The device automation backend (accessibility service, ADB bridge, …) is
//! consumed exclusively through [`DeviceAutomation`]; nothing in the agent
//! reaches for a process-wide handle.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Side length of the normalized coordinate grid exchanged with the model.
pub const NORMALIZED_GRID: u32 = 1000;

/// Errors surfaced by device automation backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The backend executed the call but reported failure.
    #[error("device rejected {0}")]
    Rejected(String),

    /// The backend is not connected or has gone away.
    #[error("device unavailable: {0}")]
    Unavailable(String),

    /// Arguments could not be mapped onto the device.
    #[error("invalid device input: {0}")]
    InvalidInput(String),
}

impl DeviceError {
    pub fn rejected(operation: impl Into<String>) -> Self {
        Self::Rejected(operation.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Identifier of one agent run, attached to log records.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Global navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalKey {
    Back,
    Home,
}

/// How much detail the UI snapshot dump should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiDetail {
    /// Only interactive / text-bearing nodes.
    #[default]
    Compact,
    /// Every node with bounds and resource ids.
    Full,
}

/// A screenshot returned by the device.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenCapture {
    pub width: u32,
    pub height: u32,
    /// Encoded image bytes (PNG).
    pub data: Vec<u8>,
}

impl ScreenCapture {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }
}

impl fmt::Debug for ScreenCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenCapture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Point on the 0-1000 grid the model reasons in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: u32,
    pub y: u32,
}

impl NormalizedPoint {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Map onto device pixels, clamped inside the screen.
    pub fn to_pixels(self, width: u32, height: u32) -> (i32, i32) {
        (scale(self.x, width), scale(self.y, height))
    }
}

fn scale(value: u32, extent: u32) -> i32 {
    if extent == 0 {
        return 0;
    }
    let value = value.min(NORMALIZED_GRID) as u64;
    let pixel = value * extent as u64 / NORMALIZED_GRID as u64;
    pixel.min(extent as u64 - 1) as i32
}

/// Narrow interface onto the device automation backend.
///
/// Window-change timestamps are opaque monotonically increasing
/// milliseconds supplied by the backend.
#[async_trait]
pub trait DeviceAutomation: Send + Sync {
    /// Package / identifier of the app currently in the foreground.
    async fn foreground_app(&self) -> DeviceResult<String>;

    /// Physical screen size in pixels.
    async fn screen_size(&self) -> DeviceResult<(u32, u32)>;

    async fn capture_screenshot(&self) -> DeviceResult<ScreenCapture>;

    async fn dump_ui_snapshot(&self, max_nodes: usize, detail: UiDetail) -> DeviceResult<String>;

    async fn tap(&self, x: i32, y: i32) -> DeviceResult<()>;

    async fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration: Duration)
        -> DeviceResult<()>;

    async fn set_focused_text(&self, text: &str) -> DeviceResult<()>;

    async fn click_element(&self, selector: &str) -> DeviceResult<()>;

    async fn set_text_on_element(&self, selector: &str, text: &str) -> DeviceResult<()>;

    async fn press_global(&self, key: GlobalKey) -> DeviceResult<()>;

    async fn launch_app(&self, identifier: &str) -> DeviceResult<()>;

    /// Wait until a window change newer than `since` is observed.
    /// Returns `false` on timeout.
    async fn await_window_change(&self, since: u64, timeout: Duration) -> bool;

    fn last_window_change(&self) -> u64;

    /// Second half of a tap+type: the field was tapped when the window stamp
    /// was `since`. Wait for the keyboard window, then set the focused text.
    async fn type_after_tap(
        &self,
        since: u64,
        text: &str,
        keyboard_timeout: Duration,
    ) -> DeviceResult<()> {
        // The keyboard does not always raise a window event; carry on either way.
        let _ = self.await_window_change(since, keyboard_timeout).await;
        self.set_focused_text(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_point_maps_to_pixels() {
        let point = NormalizedPoint::new(500, 250);
        assert_eq!(point.to_pixels(1080, 2400), (540, 600));
    }

    #[test]
    fn test_normalized_point_clamps_edges() {
        assert_eq!(NormalizedPoint::new(1000, 1000).to_pixels(1080, 2400), (1079, 2399));
        assert_eq!(NormalizedPoint::new(4000, 0).to_pixels(1080, 2400), (1079, 0));
        assert_eq!(NormalizedPoint::new(10, 10).to_pixels(0, 0), (0, 0));
    }

    #[test]
    fn test_screen_capture_debug_hides_bytes() {
        let capture = ScreenCapture::new(10, 20, vec![0; 4096]);
        let rendered = format!("{capture:?}");
        assert!(rendered.contains("bytes: 4096"));
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
