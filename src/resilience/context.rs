//! Failure context and recovery outcome types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::adapters::queue::QueuedRetryJob;
use crate::resilience::fallback::SafeDefault;

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    PlatformApi,
    Database,
    Webhook,
    RateLimit,
    Timeout,
    Validation,
    Authentication,
    Network,
    Unknown,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 9] = [
        ErrorCategory::PlatformApi,
        ErrorCategory::Database,
        ErrorCategory::Webhook,
        ErrorCategory::RateLimit,
        ErrorCategory::Timeout,
        ErrorCategory::Validation,
        ErrorCategory::Authentication,
        ErrorCategory::Network,
        ErrorCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::PlatformApi => "platform_api",
            ErrorCategory::Database => "database",
            ErrorCategory::Webhook => "webhook",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Network => "network",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Whether failures of this category say anything about the health of
    /// the dependency. Client and credential errors do not.
    pub fn trips_breaker(&self) -> bool {
        !matches!(self, ErrorCategory::Validation | ErrorCategory::Authentication)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recovery strategies the selector can choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Retry,
    CircuitBreaker,
    Fallback,
    Queue,
    Ignore,
    Escalate,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Retry => "retry",
            Strategy::CircuitBreaker => "circuit_breaker",
            Strategy::Fallback => "fallback",
            Strategy::Queue => "queue",
            Strategy::Ignore => "ignore",
            Strategy::Escalate => "escalate",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message and cause chain captured from a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    /// `source()` chain, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// Capture an error's display text and its full source chain.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: error.to_string(),
            causes,
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for cause in &self.causes {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

/// What the caller knows about an operation before it runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationContext {
    pub operation: String,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl OperationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Default::default()
        }
    }

    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One classified failure. Built fresh per failure and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub error: ErrorInfo,
    pub category: ErrorCategory,
    pub operation: String,
    /// 1-based attempt within the current retry loop.
    pub attempt: u32,
    pub max_attempts: u32,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ErrorContext {
    pub fn new(
        operation: &OperationContext,
        error: ErrorInfo,
        category: ErrorCategory,
        attempt: u32,
        max_attempts: u32,
    ) -> Self {
        Self {
            error,
            category,
            operation: operation.operation.clone(),
            attempt,
            max_attempts,
            tenant_id: operation.tenant_id.clone(),
            user_id: operation.user_id.clone(),
            metadata: operation.metadata.clone(),
        }
    }

    /// Key of the circuit breaker this failure counts against.
    pub fn breaker_key(&self) -> BreakerKey {
        BreakerKey::new(self.category, &self.operation)
    }

    /// `tenant:operation`, or `global:operation` when untenanted.
    pub fn rate_limit_key(&self) -> String {
        format!(
            "{}:{}",
            self.tenant_id.as_deref().unwrap_or("global"),
            self.operation
        )
    }

    pub fn attempts_remain(&self) -> bool {
        self.attempt < self.max_attempts
    }
}

/// Circuit breaker identity: `category:operation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BreakerKey {
    pub category: ErrorCategory,
    pub operation: String,
}

impl BreakerKey {
    pub fn new(category: ErrorCategory, operation: &str) -> Self {
        Self {
            category,
            operation: operation.to_string(),
        }
    }
}

impl fmt::Display for BreakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.operation)
    }
}

/// Outcome of one `handle_error` call.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryResult {
    pub success: bool,
    pub strategy: Strategy,
    pub final_attempt: u32,
    pub total_duration: Duration,
    pub fallback_used: bool,
    pub queued_for_retry: bool,
    pub error: Option<String>,
    /// Backoff slept before returning (RETRY only).
    pub delay: Option<Duration>,
    pub fallback: Option<SafeDefault>,
    pub job: Option<QueuedRetryJob>,
}

/// Value produced by `with_error_recovery` when it does not propagate.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovered<T> {
    /// The operation itself succeeded.
    Value(T),
    /// A safe default stands in for the result.
    Fallback(SafeDefault),
    /// The work was handed to the durable queue.
    Deferred(QueuedRetryJob),
}

impl<T> Recovered<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            Recovered::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Recovered::Value(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Recovered::Fallback(_))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Recovered::Deferred(_))
    }
}
