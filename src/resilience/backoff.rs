//! Retry backoff: progressive table or exponential with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::{BackoffKind, RetryConfig};

/// Calculate exponential backoff delay with jitter, capped at `max_ms`.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay), still within the cap
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay.saturating_add(jitter).min(max_ms))
}

/// Delay schedule used by the RETRY strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// `table[attempt - 1]`, repeating the last entry past the end.
    Table { delays: Vec<Duration>, max: Duration },
    Exponential { base: Duration, max: Duration },
}

impl BackoffPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        let max = Duration::from_millis(config.max_delay_ms);
        match config.backoff {
            BackoffKind::Table => BackoffPolicy::Table {
                delays: config
                    .delay_table_ms
                    .iter()
                    .map(|ms| Duration::from_millis(*ms))
                    .collect(),
                max,
            },
            BackoffKind::Exponential => BackoffPolicy::Exponential {
                base: Duration::from_millis(config.base_delay_ms),
                max,
            },
        }
    }

    /// Delay to sleep after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::Table { delays, max } => {
                let index = (attempt.max(1) as usize - 1).min(delays.len().saturating_sub(1));
                delays.get(index).copied().unwrap_or_default().min(*max)
            }
            BackoffPolicy::Exponential { base, max } => calculate_backoff(
                attempt,
                base.as_millis() as u64,
                max.as_millis() as u64,
            ),
        }
    }
}
