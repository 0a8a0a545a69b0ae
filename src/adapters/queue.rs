//! Durable retry queue seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// A job handed to the durable queue. Its lifecycle after `enqueue` belongs
/// to the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRetryJob {
    pub id: Uuid,
    pub operation: String,
    pub tenant_id: Option<String>,
    /// Serialized `ErrorContext`, enough to resume the work.
    pub payload: serde_json::Value,
    pub priority: u8,
    /// Earliest run time, milliseconds since the Unix epoch.
    pub run_at_ms: u64,
}

#[async_trait]
pub trait RetryQueue: Send + Sync {
    async fn enqueue(&self, job: QueuedRetryJob) -> EngineResult<()>;
}

/// Process-local queue that holds jobs until drained.
#[derive(Debug, Default)]
pub struct InMemoryRetryQueue {
    jobs: Mutex<Vec<QueuedRetryJob>>,
    capacity: Option<usize>,
}

impl InMemoryRetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that rejects jobs once `capacity` are pending.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            capacity: Some(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().map(|j| j.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every pending job, highest priority first.
    pub fn drain(&self) -> Vec<QueuedRetryJob> {
        let mut guard = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut jobs = std::mem::take(&mut *guard);
        drop(guard);
        jobs.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.run_at_ms.cmp(&b.run_at_ms)));
        jobs
    }
}

#[async_trait]
impl RetryQueue for InMemoryRetryQueue {
    async fn enqueue(&self, job: QueuedRetryJob) -> EngineResult<()> {
        let mut jobs = self
            .jobs
            .lock()
            .map_err(|_| EngineError::Queue("queue mutex poisoned".into()))?;
        if let Some(capacity) = self.capacity {
            if jobs.len() >= capacity {
                return Err(EngineError::Queue(format!("queue full ({} jobs)", capacity)));
            }
        }
        tracing::debug!(job_id = %job.id, operation = %job.operation, "Job enqueued");
        jobs.push(job);
        Ok(())
    }
}
