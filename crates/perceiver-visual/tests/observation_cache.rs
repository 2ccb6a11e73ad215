use async_trait::async_trait;
use droidpilot_core_types::{
    DeviceAutomation, DeviceError, DeviceResult, GlobalKey, ScreenCapture, UiDetail,
};
use perceiver_visual::{ObservationCache, ObservationCacheConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct CountingDevice {
    captures: AtomicU64,
    window_stamp: AtomicU64,
    fail_capture: AtomicBool,
}

impl CountingDevice {
    fn window_changed(&self) {
        self.window_stamp.fetch_add(1, Ordering::SeqCst);
    }

    fn captures(&self) -> u64 {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceAutomation for CountingDevice {
    async fn foreground_app(&self) -> DeviceResult<String> {
        Ok("com.example.mail".to_string())
    }

    async fn screen_size(&self) -> DeviceResult<(u32, u32)> {
        Ok((1080, 2400))
    }

    async fn capture_screenshot(&self) -> DeviceResult<ScreenCapture> {
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(DeviceError::rejected("capture_screenshot"));
        }
        let n = self.captures.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ScreenCapture::new(1080, 2400, vec![n as u8; 16]))
    }

    async fn dump_ui_snapshot(&self, _max_nodes: usize, _detail: UiDetail) -> DeviceResult<String> {
        Ok(String::new())
    }

    async fn tap(&self, _x: i32, _y: i32) -> DeviceResult<()> {
        Ok(())
    }

    async fn swipe(
        &self,
        _x1: i32,
        _y1: i32,
        _x2: i32,
        _y2: i32,
        _duration: Duration,
    ) -> DeviceResult<()> {
        Ok(())
    }

    async fn set_focused_text(&self, _text: &str) -> DeviceResult<()> {
        Ok(())
    }

    async fn click_element(&self, _selector: &str) -> DeviceResult<()> {
        Ok(())
    }

    async fn set_text_on_element(&self, _selector: &str, _text: &str) -> DeviceResult<()> {
        Ok(())
    }

    async fn press_global(&self, _key: GlobalKey) -> DeviceResult<()> {
        Ok(())
    }

    async fn launch_app(&self, _identifier: &str) -> DeviceResult<()> {
        Ok(())
    }

    async fn await_window_change(&self, _since: u64, _timeout: Duration) -> bool {
        true
    }

    fn last_window_change(&self) -> u64 {
        self.window_stamp.load(Ordering::SeqCst)
    }
}

fn config() -> ObservationCacheConfig {
    ObservationCacheConfig {
        ttl_ms: 2_000,
        max_entries: 4,
        min_capture_interval_ms: 500,
    }
}

#[tokio::test(start_paused = true)]
async fn unchanged_screen_within_ttl_reuses_cached_bytes() {
    let device = CountingDevice::default();
    let cache = ObservationCache::new(config());

    let first = cache.get_or_capture(&device).await.expect("first capture");
    tokio::time::advance(Duration::from_millis(800)).await;
    let second = cache.get_or_capture(&device).await.expect("cached capture");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(device.captures(), 1);
    assert_eq!(cache.stats().await.cache_hits, 1);
}

#[tokio::test(start_paused = true)]
async fn window_change_forces_fresh_capture() {
    let device = CountingDevice::default();
    let cache = ObservationCache::new(config());

    let first = cache.get_or_capture(&device).await.expect("first capture");
    tokio::time::advance(Duration::from_millis(600)).await;
    device.window_changed();
    let second = cache.get_or_capture(&device).await.expect("fresh capture");

    assert_eq!(device.captures(), 2);
    assert_ne!(first.data, second.data);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_is_recaptured() {
    let device = CountingDevice::default();
    let cache = ObservationCache::new(config());

    cache.get_or_capture(&device).await.expect("first capture");
    tokio::time::advance(Duration::from_millis(2_500)).await;
    cache.get_or_capture(&device).await.expect("recapture");

    assert_eq!(device.captures(), 2);
}

#[tokio::test(start_paused = true)]
async fn requests_inside_min_interval_never_both_capture() {
    let device = CountingDevice::default();
    let cache = ObservationCache::new(config());

    assert!(cache.get_or_capture(&device).await.is_some());
    device.window_changed();
    tokio::time::advance(Duration::from_millis(100)).await;
    // New window stamp misses the cache and the throttle refuses a capture.
    assert!(cache.get_or_capture(&device).await.is_none());

    assert_eq!(device.captures(), 1);
    assert_eq!(cache.stats().await.throttled, 1);
}

#[tokio::test(start_paused = true)]
async fn throttled_request_falls_back_to_cache() {
    let device = CountingDevice::default();
    let cache = ObservationCache::new(config());

    let first = cache.get_or_capture(&device).await.expect("capture");
    let second = cache.get_or_capture(&device).await.expect("cache fallback");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(device.captures(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_capture_does_not_arm_throttle() {
    let device = CountingDevice::default();
    let cache = ObservationCache::new(config());

    device.fail_capture.store(true, Ordering::SeqCst);
    assert!(cache.get_or_capture(&device).await.is_none());

    device.fail_capture.store(false, Ordering::SeqCst);
    assert!(cache.get_or_capture(&device).await.is_some());
    assert_eq!(cache.stats().await.capture_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn clear_resets_cache_and_throttle() {
    let device = CountingDevice::default();
    let cache = ObservationCache::new(config());

    cache.get_or_capture(&device).await.expect("capture");
    cache.clear().await;
    assert_eq!(cache.cached_entries().await, 0);

    cache.get_or_capture(&device).await.expect("capture after clear");
    assert_eq!(device.captures(), 2);
}
