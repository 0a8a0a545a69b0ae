//! Failure classification.
//!
//! # Responsibilities
//! - Map an error message to exactly one `ErrorCategory`
//!
//! # Design Decisions
//! - Ordered rule list, first match wins
//! - Case-insensitive substring matching on the message only
//! - Pure: no state, no side effects

use crate::resilience::context::ErrorCategory;

/// Rules in evaluation order.
const RULES: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::PlatformApi,
        &["shopify", "graphql", "platform api", "storefront"],
    ),
    (
        ErrorCategory::Database,
        &["database", "connection", "query", "sql", "prisma", "constraint", "duplicate key", "deadlock"],
    ),
    (ErrorCategory::Webhook, &["webhook", "signature", "hmac"]),
    (
        ErrorCategory::RateLimit,
        &["rate limit", "ratelimit", "rate-limit", "throttl", "too many requests"],
    ),
    (
        ErrorCategory::Timeout,
        &["timeout", "timed out", "etimedout", "deadline exceeded"],
    ),
    (ErrorCategory::Validation, &["validation", "invalid", "malformed"]),
    (
        ErrorCategory::Authentication,
        &["unauthorized", "unauthenticated", "forbidden", "authentication"],
    ),
    (
        ErrorCategory::Network,
        &["network", "fetch", "econnrefused", "econnreset", "enotfound", "socket hang up", "dns"],
    ),
];

/// Classify a failure by its message.
pub fn classify(message: &str) -> ErrorCategory {
    let message = message.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| message.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(ErrorCategory::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_category() {
        assert_eq!(classify("Shopify GraphQL returned errors"), ErrorCategory::PlatformApi);
        assert_eq!(classify("connection refused"), ErrorCategory::Database);
        assert_eq!(classify("unique constraint violated"), ErrorCategory::Database);
        assert_eq!(classify("Webhook HMAC mismatch"), ErrorCategory::Webhook);
        assert_eq!(classify("Request was throttled"), ErrorCategory::RateLimit);
        assert_eq!(classify("operation timed out"), ErrorCategory::Timeout);
        assert_eq!(classify("Invalid email address"), ErrorCategory::Validation);
        assert_eq!(classify("Unauthorized"), ErrorCategory::Authentication);
        assert_eq!(classify("ECONNRESET"), ErrorCategory::Network);
        assert_eq!(classify("fetch failed"), ErrorCategory::Network);
        assert_eq!(classify("something odd happened"), ErrorCategory::Unknown);
    }

    #[test]
    fn test_first_match_wins() {
        // Platform keywords outrank the timeout rule
        assert_eq!(classify("Shopify API timeout"), ErrorCategory::PlatformApi);
        // Database outranks timeout
        assert_eq!(classify("database query timeout"), ErrorCategory::Database);
        // Validation outranks authentication
        assert_eq!(classify("invalid authentication header"), ErrorCategory::Validation);
    }

    #[test]
    fn test_deterministic() {
        let msg = "upstream webhook signature invalid";
        let first = classify(msg);
        for _ in 0..10 {
            assert_eq!(classify(msg), first);
        }
    }

    #[test]
    fn test_empty_message() {
        assert_eq!(classify(""), ErrorCategory::Unknown);
    }
}
