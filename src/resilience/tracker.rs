//! Bounded failure history for statistics.
//!
//! # Responsibilities
//! - Append every handled failure to a per-key log (`category:operation`)
//! - Drop entries past the retention horizon on each cleanup tick
//! - Project current state into per-key statistics
//!
//! # Design Decisions
//! - Read-only with respect to strategy selection; nothing here feeds back
//!   into recovery decisions
//! - Each key is capped at `max_entries_per_key` so sustained failure load
//!   between ticks cannot grow memory without bound

use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

use crate::config::TrackerConfig;
use crate::resilience::context::{ErrorCategory, ErrorContext};

const LAST_HOUR: Duration = Duration::from_secs(60 * 60);

/// An `ErrorContext` snapshot with the time it was tracked.
#[derive(Debug, Clone)]
pub struct TrackedError {
    pub context: ErrorContext,
    pub recorded_at: Instant,
    /// Wall-clock milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

/// Per-key statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStats {
    pub total: usize,
    pub last_hour: usize,
    pub by_category: BTreeMap<ErrorCategory, usize>,
    pub last_error: Option<String>,
    pub last_seen_ms: Option<u64>,
}

/// What a cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub entries_removed: usize,
    pub keys_removed: usize,
}

pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub struct ErrorTracker {
    entries: DashMap<String, VecDeque<TrackedError>>,
    retention: Duration,
    max_per_key: usize,
}

impl ErrorTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            entries: DashMap::new(),
            retention: config.retention(),
            max_per_key: config.max_entries_per_key.max(1),
        }
    }

    pub fn track(&self, context: &ErrorContext) {
        let key = context.breaker_key().to_string();
        let mut log = self.entries.entry(key).or_default();
        if log.len() >= self.max_per_key {
            log.pop_front();
        }
        log.push_back(TrackedError {
            context: context.clone(),
            recorded_at: Instant::now(),
            timestamp_ms: epoch_millis(),
        });
    }

    /// Drop entries older than the retention horizon and empty keys.
    pub fn cleanup(&self) -> CleanupReport {
        let now = Instant::now();
        let mut report = CleanupReport::default();
        self.entries.retain(|_, log| {
            let before = log.len();
            log.retain(|e| now.saturating_duration_since(e.recorded_at) <= self.retention);
            report.entries_removed += before - log.len();
            if log.is_empty() {
                report.keys_removed += 1;
                false
            } else {
                true
            }
        });
        report
    }

    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Per-key totals, last-hour counts and category breakdown.
    pub fn statistics(&self) -> BTreeMap<String, ErrorStats> {
        let now = Instant::now();
        self.entries
            .iter()
            .map(|entry| {
                let log = entry.value();
                let mut stats = ErrorStats {
                    total: log.len(),
                    ..Default::default()
                };
                for tracked in log {
                    if now.saturating_duration_since(tracked.recorded_at) <= LAST_HOUR {
                        stats.last_hour += 1;
                    }
                    *stats.by_category.entry(tracked.context.category).or_default() += 1;
                }
                if let Some(last) = log.back() {
                    stats.last_error = Some(last.context.error.message.clone());
                    stats.last_seen_ms = Some(last.timestamp_ms);
                }
                (entry.key().clone(), stats)
            })
            .collect()
    }

    /// Recent entries for one key, newest last.
    pub fn recent(&self, key: &str) -> Vec<TrackedError> {
        self.entries
            .get(key)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }
}
