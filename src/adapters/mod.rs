//! External collaborators the engine calls out to.
//!
//! # Data Flow
//! ```text
//! RecoveryEngine
//!     → QUEUE strategy    → queue.rs (RetryQueue::enqueue)
//!     → every failure     → alert.rs (AlertSink::record, kind = Handled)
//!     → ESCALATE strategy → alert.rs (AlertSink::record, kind = Escalated)
//! ```
//!
//! # Design Decisions
//! - Async traits so real backends (Postgres, Redis, HTTP) can sit behind them
//! - The engine only builds payloads; delivery and storage belong to the adapter

pub mod alert;
pub mod queue;

pub use alert::{AlertEvent, AlertKind, AlertSink, MemoryAlertSink, TracingAlertSink};
pub use queue::{InMemoryRetryQueue, QueuedRetryJob, RetryQueue};
