//! Errors raised inside the engine itself (never by the wrapped operation).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The durable queue refused or failed to accept a job.
    #[error("queue error: {0}")]
    Queue(String),

    /// The alert sink failed to record an event.
    #[error("alert sink error: {0}")]
    Alert(String),

    /// A job payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
