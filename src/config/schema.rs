//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the recovery engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-key circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Fixed-window rate limiting settings.
    pub rate_limit: RateLimitConfig,

    /// Error history retention and cleanup cadence.
    pub tracker: TrackerConfig,

    /// Retry attempts and backoff.
    pub retries: RetryConfig,

    /// Durable queue job construction.
    pub queue: QueueConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Seconds an open circuit waits before admitting a trial call.
    pub reset_timeout_secs: u64,
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_secs: 30,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Calls allowed per window; the call after this one is denied.
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 100,
        }
    }
}

/// Error tracker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Seconds between cleanup ticks.
    pub cleanup_interval_secs: u64,

    /// Entries older than this many seconds are dropped on cleanup.
    pub retention_secs: u64,

    /// Hard cap on entries held per key (oldest are evicted first).
    pub max_entries_per_key: usize,
}

impl TrackerConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 30,
            retention_secs: 7 * 24 * 60 * 60,
            max_entries_per_key: 1000,
        }
    }
}

/// Which backoff curve the RETRY strategy sleeps on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Progressive table indexed by attempt.
    Table,
    /// Exponential growth from `base_delay_ms` with jitter.
    Exponential,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per `with_error_recovery` call.
    pub max_attempts: u32,

    /// Backoff curve.
    pub backoff: BackoffKind,

    /// Progressive delay table in milliseconds (attempt 1 uses entry 0).
    pub delay_table_ms: Vec<u64>,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Cap applied to every computed delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffKind::Table,
            delay_table_ms: vec![1000, 2000, 5000],
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

/// Queue job construction settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// How far in the future a queued job becomes runnable, in seconds.
    pub retry_delay_secs: u64,

    /// Priority for ordinary queued jobs.
    pub default_priority: u8,

    /// Priority for webhook deliveries (higher runs sooner).
    pub webhook_priority: u8,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: 300,
            default_priority: 5,
            webhook_priority: 8,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9464".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

/// Placeholder key rejected by validation when the admin API is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.reset_timeout(), Duration::from_secs(30));
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.tracker.retention(), Duration::from_secs(604_800));
        assert_eq!(config.retries.delay_table_ms, vec![1000, 2000, 5000]);
        assert_eq!(config.retries.backoff, BackoffKind::Table);
    }

    #[test]
    fn test_partial_sections() {
        let config: EngineConfig = toml::from_str(
            r#"
            [retries]
            max_attempts = 5
            backoff = "exponential"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.retries.max_attempts, 5);
        assert_eq!(config.retries.backoff, BackoffKind::Exponential);
        // Unspecified fields in a present section still default
        assert_eq!(config.retries.max_delay_ms, 30_000);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
