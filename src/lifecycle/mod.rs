//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging/metrics → Build engine
//!     → Spawn maintenance ticker → Spawn admin API
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast stop → Drain tasks (with deadline) → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
