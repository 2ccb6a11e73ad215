//! Executes parsed actions against the device automation interface.

use std::time::Duration;

use droidpilot_core_types::{DeviceAutomation, GlobalKey, NormalizedPoint};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::config::AgentLoopConfig;
use crate::action::{ActionName, ParsedAction};
use crate::errors::AgentError;

/// Field names accepted as a UI node selector instead of coordinates.
const SELECTOR_KEYS: [&str; 3] = ["resourceId", "resource_id", "selector"];

const DOUBLE_TAP_GAP: Duration = Duration::from_millis(100);

/// How an action ended up being carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Direct,
    /// Type was fused with the preceding tap into one device operation.
    FusedTapType,
}

/// A tap executed on the previous step, kept so a following `Type` can
/// reuse it instead of tapping again.
#[derive(Debug, Clone)]
pub struct TapContext {
    pub action: ParsedAction,
    /// Window-change stamp read just before the tap was sent.
    pub window_stamp: u64,
}

/// Maps one [`ParsedAction`] onto device calls.
pub struct ActionExecutor<'a> {
    device: &'a dyn DeviceAutomation,
    config: &'a AgentLoopConfig,
    cancel: &'a CancellationToken,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(
        device: &'a dyn DeviceAutomation,
        config: &'a AgentLoopConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            device,
            config,
            cancel,
        }
    }

    /// Execute `action`. `previous_tap` is the tap executed on the step
    /// before, if any; a `Type` following it only waits for the keyboard
    /// raised by that tap and sets the text.
    pub async fn execute(
        &self,
        action: &ParsedAction,
        previous_tap: Option<&TapContext>,
    ) -> Result<ExecutionMode, AgentError> {
        let name = action
            .action_name()
            .ok_or_else(|| AgentError::execution(&action.raw, "not an executable action"))?;
        debug!(target: "agent_loop", action = %name, raw = %action.raw, "executing action");

        match name {
            ActionName::Tap => {
                if let Some(selector) = selector(action) {
                    return self.device_call(action, self.device.click_element(selector).await);
                }
                let (x, y) = self.pixel_point(action, "element").await?;
                self.device_call(action, self.device.tap(x, y).await)
            }
            ActionName::DoubleTap => {
                let (x, y) = self.pixel_point(action, "element").await?;
                self.device_call(action, self.device.tap(x, y).await)?;
                self.sleep(DOUBLE_TAP_GAP).await?;
                self.device_call(action, self.device.tap(x, y).await)
            }
            ActionName::LongPress => {
                let (x, y) = self.pixel_point(action, "element").await?;
                let hold = action
                    .duration("duration")
                    .unwrap_or(Duration::from_millis(self.config.long_press_ms));
                self.device_call(action, self.device.swipe(x, y, x, y, hold).await)
            }
            ActionName::Type => self.type_text(action, previous_tap).await,
            ActionName::Swipe => {
                let (x1, y1) = self.pixel_point(action, "start").await?;
                let (x2, y2) = self.pixel_point(action, "end").await?;
                let duration = action
                    .duration("duration")
                    .unwrap_or(Duration::from_millis(self.config.swipe_duration_ms));
                self.device_call(action, self.device.swipe(x1, y1, x2, y2, duration).await)
            }
            ActionName::Launch => {
                let app = ["app", "package"]
                    .iter()
                    .find_map(|key| action.field(key))
                    .filter(|app| !app.trim().is_empty())
                    .ok_or_else(|| AgentError::execution(&action.raw, "missing app parameter"))?;
                self.device_call(action, self.device.launch_app(app.trim()).await)
            }
            ActionName::Back => {
                self.device_call(action, self.device.press_global(GlobalKey::Back).await)
            }
            ActionName::Home => {
                self.device_call(action, self.device.press_global(GlobalKey::Home).await)
            }
            ActionName::Wait => {
                let duration = action
                    .duration("duration")
                    .unwrap_or(Duration::from_millis(self.config.default_wait_ms));
                self.sleep(duration).await?;
                Ok(ExecutionMode::Direct)
            }
            ActionName::TakeOver | ActionName::Note | ActionName::CallApi | ActionName::Interact => {
                Err(AgentError::take_over(action.message()))
            }
            ActionName::Other(other) => Err(AgentError::execution(
                &action.raw,
                format!("unsupported action {other}"),
            )),
        }
    }

    async fn type_text(
        &self,
        action: &ParsedAction,
        previous_tap: Option<&TapContext>,
    ) -> Result<ExecutionMode, AgentError> {
        let text = action
            .field("text")
            .ok_or_else(|| AgentError::execution(&action.raw, "missing text parameter"))?;

        if let Some(selector) = selector(action) {
            return self.device_call(action, self.device.set_text_on_element(selector, text).await);
        }

        if let Some(tap) = previous_tap {
            debug!(target: "agent_loop", tap = %tap.action.raw, "typing into the field tapped on the previous step");
            self.device
                .type_after_tap(tap.window_stamp, text, self.config.keyboard_timeout())
                .await
                .map_err(|err| AgentError::device(&action.raw, err))?;
            return Ok(ExecutionMode::FusedTapType);
        }

        self.device_call(action, self.device.set_focused_text(text).await)
    }

    fn device_call(
        &self,
        action: &ParsedAction,
        result: droidpilot_core_types::DeviceResult<()>,
    ) -> Result<ExecutionMode, AgentError> {
        result
            .map(|_| ExecutionMode::Direct)
            .map_err(|err| AgentError::device(&action.raw, err))
    }

    async fn pixel_point(&self, action: &ParsedAction, key: &str) -> Result<(i32, i32), AgentError> {
        let point = action.point(key).ok_or_else(|| {
            AgentError::execution(&action.raw, format!("missing or invalid {key} coordinates"))
        })?;
        self.to_pixels(action, point).await
    }

    async fn to_pixels(
        &self,
        action: &ParsedAction,
        point: NormalizedPoint,
    ) -> Result<(i32, i32), AgentError> {
        let (width, height) = self
            .device
            .screen_size()
            .await
            .map_err(|err| AgentError::device(&action.raw, err))?;
        Ok(point.to_pixels(width, height))
    }

    async fn sleep(&self, duration: Duration) -> Result<(), AgentError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

fn selector(action: &ParsedAction) -> Option<&str> {
    SELECTOR_KEYS
        .iter()
        .find_map(|key| action.field(key))
        .filter(|value| !value.trim().is_empty())
}
