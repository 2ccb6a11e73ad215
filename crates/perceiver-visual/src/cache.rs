///! Screenshot caching with TTL and LRU bounds
use crate::models::CacheKey;
use droidpilot_core_types::ScreenCapture;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Cache for screenshots
pub struct ScreenshotCache {
    entries: LruCache<CacheKey, CachedScreenshot>,
    ttl: Duration,
}

struct CachedScreenshot {
    screenshot: Arc<ScreenCapture>,
    captured_at: Instant,
}

impl ScreenshotCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Get screenshot from cache if still within TTL
    pub fn get(&mut self, key: &CacheKey, now: Instant) -> Option<Arc<ScreenCapture>> {
        let expired = match self.entries.get(key) {
            Some(entry) if now.duration_since(entry.captured_at) <= self.ttl => {
                return Some(entry.screenshot.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.pop(key);
        }
        None
    }

    /// Put screenshot into cache, dropping expired entries first
    pub fn put(&mut self, key: CacheKey, screenshot: Arc<ScreenCapture>, now: Instant) {
        self.evict_expired(now);
        // LruCache drops the least recently used entry once capacity is reached.
        self.entries.put(
            key,
            CachedScreenshot {
                screenshot,
                captured_at: now,
            },
        );
    }

    /// Remove every entry older than the TTL, returning how many were dropped
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let stale: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.captured_at) > self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            self.entries.pop(key);
        }
        stale.len()
    }

    /// Clear all cached screenshots
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
