//! Recovery strategy selection.
//!
//! Evaluation order, first applicable wins:
//! 1. breaker for `category:operation` is open → CircuitBreaker
//! 2. rate limiter for `tenant:operation` denies → Queue
//! 3. category rule, with `attempt < max_attempts` as the tiebreak
//!
//! The selector is pure. The engine gathers the breaker and limiter signals
//! and passes them in, so the limiter is only charged when rule 1 did not
//! already decide.

use crate::resilience::context::{ErrorCategory, ErrorContext, Strategy};

/// Live state consulted ahead of the category rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub breaker_open: bool,
    pub rate_limited: bool,
}

fn mentions(message: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| message.contains(k))
}

/// Choose the strategy for one failure.
pub fn select(context: &ErrorContext, signals: Signals) -> Strategy {
    if signals.breaker_open {
        return Strategy::CircuitBreaker;
    }
    if signals.rate_limited {
        return Strategy::Queue;
    }
    category_rule(context)
}

/// Rule 3 in isolation.
pub fn category_rule(context: &ErrorContext) -> Strategy {
    let message = context.error.message.to_lowercase();
    let retry_or = |exhausted: Strategy| {
        if context.attempts_remain() {
            Strategy::Retry
        } else {
            exhausted
        }
    };

    match context.category {
        ErrorCategory::PlatformApi => {
            if mentions(&message, &["rate limit", "throttl"]) {
                Strategy::Queue
            } else if mentions(&message, &["timeout", "network"]) {
                retry_or(Strategy::CircuitBreaker)
            } else if mentions(&message, &["unauthorized", "forbidden"]) {
                Strategy::Escalate
            } else {
                retry_or(Strategy::Fallback)
            }
        }
        ErrorCategory::Database => {
            if mentions(&message, &["connection", "timeout"]) {
                retry_or(Strategy::CircuitBreaker)
            } else if mentions(&message, &["constraint", "duplicate"]) {
                Strategy::Ignore
            } else {
                retry_or(Strategy::Escalate)
            }
        }
        // Webhook deliveries must not be dropped silently
        ErrorCategory::Webhook => {
            if context.attempts_remain() {
                Strategy::Queue
            } else {
                Strategy::Fallback
            }
        }
        ErrorCategory::Timeout => retry_or(Strategy::Fallback),
        ErrorCategory::Network => retry_or(Strategy::Queue),
        ErrorCategory::Validation => Strategy::Ignore,
        ErrorCategory::Authentication => Strategy::Escalate,
        ErrorCategory::RateLimit | ErrorCategory::Unknown => retry_or(Strategy::Escalate),
    }
}
