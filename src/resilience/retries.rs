//! Retry orchestration around an arbitrary async operation.
//!
//! # Responsibilities
//! - Gate each attempt on the operation's circuit breakers
//! - Invoke the operation (the only place it is ever invoked)
//! - Hand each failure to `handle_error` and act on the chosen strategy
//!
//! # Design Decisions
//! - Strategy handlers never call the operation; RETRY only sleeps and the
//!   loop re-invokes
//! - IGNORE and ESCALATE propagate the caller's own error immediately
//! - FALLBACK / CIRCUIT_BREAKER end the loop with a safe default, QUEUE ends
//!   it with the deferred job
//! - No built-in deadline; wrap the call in `tokio::time::timeout` to bound it

use std::future::Future;

use crate::resilience::circuit_breaker::Admission;
use crate::resilience::classifier::classify;
use crate::resilience::context::{
    ErrorContext, ErrorInfo, OperationContext, Recovered, Strategy,
};
use crate::resilience::engine::RecoveryEngine;

impl RecoveryEngine {
    /// Run `operation` with classification, backoff, breaker gating,
    /// fallbacks and queueing. Returns the caller's last error when recovery
    /// cannot produce a usable result.
    pub async fn with_error_recovery<T, E, F, Fut>(
        &self,
        mut operation: F,
        context: OperationContext,
        max_attempts: u32,
    ) -> Result<Recovered<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let trials = match self.breakers.admit(&context.operation) {
                Admission::Rejected(key) => {
                    tracing::info!(
                        operation = %context.operation,
                        breaker = %key,
                        "Circuit open, serving fallback without invoking operation"
                    );
                    return Ok(Recovered::Fallback(self.fallback_for(&context.operation)));
                }
                Admission::Trial(keys) => keys,
                Admission::Allowed => Vec::new(),
            };

            let error = match operation().await {
                Ok(value) => {
                    self.breakers.record_success(&context.operation, &trials);
                    if attempt > 1 {
                        tracing::info!(
                            operation = %context.operation,
                            attempt,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(Recovered::Value(value));
                }
                Err(error) => error,
            };

            let info = ErrorInfo::from_error(&error);
            let category = classify(&info.message);
            let failure = ErrorContext::new(&context, info, category, attempt, max_attempts);

            // A failed trial reopens every breaker it was probing. The one this
            // failure counts against is reopened by `handle_error` itself.
            let own_key = failure.breaker_key();
            for key in trials {
                if !(category.trips_breaker() && key == own_key) {
                    self.breakers.record_failure(&key);
                }
            }

            let result = self.handle_error(failure).await;
            match result.strategy {
                Strategy::Ignore | Strategy::Escalate => return Err(error),
                Strategy::CircuitBreaker | Strategy::Fallback => {
                    if let Some(fallback) = result.fallback {
                        return Ok(Recovered::Fallback(fallback));
                    }
                }
                Strategy::Queue => {
                    if let Some(job) = result.job {
                        return Ok(Recovered::Deferred(job));
                    }
                }
                Strategy::Retry => {}
            }

            if attempt >= max_attempts {
                tracing::warn!(
                    operation = %context.operation,
                    attempts = attempt,
                    "Retries exhausted"
                );
                return Err(error);
            }
            attempt += 1;
        }
    }
}
