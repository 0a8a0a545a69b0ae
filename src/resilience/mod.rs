//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! with_error_recovery (retries.rs)
//!     → circuit_breaker.rs (gate: open breaker short-circuits to fallback)
//!     → invoke operation
//!     → on failure: classifier.rs (category)
//!         → engine.rs handle_error
//!             → tracker.rs (history, statistics only)
//!             → circuit_breaker.rs (count failure)
//!             → strategy.rs (breaker signal, rate_limit.rs signal, category rule)
//!             → execute: backoff.rs sleep | fallback.rs | queue | alert
//!     → loop, return value / fallback / deferred job, or re-raise
//! ```
//!
//! # Design Decisions
//! - All per-key state is owned by one `RecoveryEngine` instance
//! - Per-key read-modify-write is serialized; distinct keys never contend
//! - Only the RETRY backoff suspends the caller, and it is a tokio sleep

pub mod backoff;
pub mod circuit_breaker;
pub mod classifier;
pub mod context;
pub mod engine;
pub mod fallback;
pub mod rate_limit;
pub mod retries;
pub mod strategy;
pub mod tracker;

pub use circuit_breaker::{BreakerSnapshot, CircuitState};
pub use classifier::classify;
pub use context::{
    BreakerKey, ErrorCategory, ErrorContext, ErrorInfo, OperationContext, RecoveryResult,
    Recovered, Strategy,
};
pub use engine::{RecoveryEngine, RecoveryEngineBuilder};
pub use fallback::{FallbackResolver, SafeDefault};
pub use tracker::ErrorStats;
