//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → handed to RecoveryEngine and the daemon's subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::AdminConfig;
pub use schema::BackoffKind;
pub use schema::CircuitBreakerConfig;
pub use schema::EngineConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::QueueConfig;
pub use schema::RateLimitConfig;
pub use schema::RetryConfig;
pub use schema::TrackerConfig;
