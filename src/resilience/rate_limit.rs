//! Fixed-window rate limiting keyed by `tenant:operation`.

use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// A single fixed window.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Result of counting one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Denied { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowSnapshot {
    pub key: String,
    pub count: u32,
    pub resets_in_ms: u64,
}

/// Lazily created fixed windows; expired windows are replaced on next use
/// and swept by the engine's maintenance tick.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    window: Duration,
    max: u32,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            window: config.window(),
            max: config.max_requests,
        }
    }

    /// Count one call against `key`.
    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });

        let window = entry.value_mut();
        if now >= window.reset_at {
            *window = Window {
                count: 0,
                reset_at: now + self.window,
            };
        }

        if window.count >= self.max {
            // Saturate at max + 1 so the count stays meaningful while denied
            window.count = self.max.saturating_add(1);
            return RateDecision::Denied {
                retry_after: window.reset_at.saturating_duration_since(now),
            };
        }

        window.count += 1;
        RateDecision::Allowed {
            remaining: self.max - window.count,
        }
    }

    /// Current count for `key`, if its window is still live.
    pub fn count(&self, key: &str) -> Option<u32> {
        let now = Instant::now();
        self.windows
            .get(key)
            .filter(|w| now < w.reset_at)
            .map(|w| w.count)
    }

    /// Drop expired windows. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, w| now < w.reset_at);
        before.saturating_sub(self.windows.len())
    }

    pub fn snapshots(&self) -> Vec<WindowSnapshot> {
        let now = Instant::now();
        let mut snapshots: Vec<_> = self
            .windows
            .iter()
            .filter(|r| now < r.value().reset_at)
            .map(|r| WindowSnapshot {
                key: r.key().clone(),
                count: r.value().count,
                resets_in_ms: r.value().reset_at.saturating_duration_since(now).as_millis() as u64,
            })
            .collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        snapshots
    }
}
