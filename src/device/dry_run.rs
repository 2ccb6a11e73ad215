//! Device backend that performs nothing and logs every operation.
//!
//! Lets the agent loop run end to end without a phone attached: launches
//! change the reported foreground app, every other call succeeds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use droidpilot_core_types::{
    DeviceAutomation, DeviceError, DeviceResult, GlobalKey, ScreenCapture, UiDetail,
};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::DeviceConfig;

pub struct DryRunDevice {
    width: u32,
    height: u32,
    foreground: Mutex<String>,
    operations: Mutex<Vec<String>>,
    window_changes: AtomicU64,
}

impl DryRunDevice {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            width: config.screen_width,
            height: config.screen_height,
            foreground: Mutex::new(config.foreground_app.clone()),
            operations: Mutex::new(Vec::new()),
            window_changes: AtomicU64::new(0),
        }
    }

    /// Operations performed so far, oldest first.
    pub async fn operations(&self) -> Vec<String> {
        self.operations.lock().await.clone()
    }

    async fn record(&self, entry: String) {
        info!(target: "dry_run_device", operation = %entry, "dry-run device operation");
        self.window_changes.fetch_add(1, Ordering::SeqCst);
        self.operations.lock().await.push(entry);
    }
}

#[async_trait]
impl DeviceAutomation for DryRunDevice {
    async fn foreground_app(&self) -> DeviceResult<String> {
        Ok(self.foreground.lock().await.clone())
    }

    async fn screen_size(&self) -> DeviceResult<(u32, u32)> {
        Ok((self.width, self.height))
    }

    async fn capture_screenshot(&self) -> DeviceResult<ScreenCapture> {
        Err(DeviceError::Unavailable(
            "dry-run device has no screen".to_string(),
        ))
    }

    async fn dump_ui_snapshot(&self, _max_nodes: usize, detail: UiDetail) -> DeviceResult<String> {
        let app = self.foreground.lock().await.clone();
        Ok(match detail {
            UiDetail::Compact => format!("[window] {app}"),
            UiDetail::Full => format!(
                "[window] {app} bounds=[0,0][{},{}] (dry run, no nodes)",
                self.width, self.height
            ),
        })
    }

    async fn tap(&self, x: i32, y: i32) -> DeviceResult<()> {
        self.record(format!("tap:{x},{y}")).await;
        Ok(())
    }

    async fn swipe(
        &self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration: Duration,
    ) -> DeviceResult<()> {
        self.record(format!(
            "swipe:{x1},{y1}->{x2},{y2}:{}ms",
            duration.as_millis()
        ))
        .await;
        Ok(())
    }

    async fn set_focused_text(&self, text: &str) -> DeviceResult<()> {
        self.record(format!("text:{text}")).await;
        Ok(())
    }

    async fn click_element(&self, selector: &str) -> DeviceResult<()> {
        self.record(format!("click:{selector}")).await;
        Ok(())
    }

    async fn set_text_on_element(&self, selector: &str, text: &str) -> DeviceResult<()> {
        self.record(format!("text:{selector}:{text}")).await;
        Ok(())
    }

    async fn press_global(&self, key: GlobalKey) -> DeviceResult<()> {
        self.record(format!("key:{key:?}")).await;
        Ok(())
    }

    async fn launch_app(&self, identifier: &str) -> DeviceResult<()> {
        *self.foreground.lock().await = identifier.to_string();
        self.record(format!("launch:{identifier}")).await;
        Ok(())
    }

    async fn await_window_change(&self, since: u64, _timeout: Duration) -> bool {
        self.last_window_change() > since
    }

    fn last_window_change(&self) -> u64 {
        self.window_changes.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_launch_changes_foreground_app() {
        let device = DryRunDevice::new(&DeviceConfig::default());
        device.launch_app("com.android.settings").await.unwrap();
        assert_eq!(
            device.foreground_app().await.unwrap(),
            "com.android.settings"
        );
        assert_eq!(device.operations().await, vec!["launch:com.android.settings"]);
    }

    #[tokio::test]
    async fn test_type_after_tap_does_not_tap_again() {
        let device = DryRunDevice::new(&DeviceConfig::default());
        let since = device.last_window_change();
        device.tap(10, 20).await.unwrap();
        device
            .type_after_tap(since, "hello", Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(device.operations().await, vec!["tap:10,20", "text:hello"]);
        assert_eq!(device.last_window_change(), 2);
    }

    #[tokio::test]
    async fn test_screenshot_is_unavailable() {
        let device = DryRunDevice::new(&DeviceConfig::default());
        assert!(matches!(
            device.capture_screenshot().await,
            Err(DeviceError::Unavailable(_))
        ));
    }
}
