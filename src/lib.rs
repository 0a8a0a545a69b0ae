//! Error recovery engine for services that depend on unreliable external
//! systems: failure classification, per-key circuit breakers, tenant rate
//! limiting, retry with backoff, safe fallbacks and deferred queueing.

pub mod adapters;
pub mod admin;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::EngineConfig;
pub use error::EngineError;
pub use lifecycle::Shutdown;
pub use resilience::{OperationContext, RecoveryEngine, Recovered};
