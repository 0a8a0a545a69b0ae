//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use recovery_engine::adapters::{InMemoryRetryQueue, MemoryAlertSink};
use recovery_engine::{EngineConfig, RecoveryEngine};

/// Error returned by scripted operations.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TestError(pub String);

/// An engine wired to inspectable queue and alert adapters.
pub struct Harness {
    pub engine: Arc<RecoveryEngine>,
    pub queue: Arc<InMemoryRetryQueue>,
    pub alerts: Arc<MemoryAlertSink>,
}

pub fn harness(config: EngineConfig) -> Harness {
    let queue = Arc::new(InMemoryRetryQueue::new());
    let alerts = Arc::new(MemoryAlertSink::new());
    let engine = Arc::new(
        RecoveryEngine::builder(config)
            .queue(queue.clone())
            .alerts(alerts.clone())
            .build(),
    );
    Harness {
        engine,
        queue,
        alerts,
    }
}

/// Counts invocations and fails the first `failures` of them with `message`.
#[derive(Clone)]
pub struct ScriptedOperation {
    calls: Arc<AtomicU32>,
    failures: u32,
    message: &'static str,
}

impl ScriptedOperation {
    pub fn failing_times(failures: u32, message: &'static str) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
            message,
        }
    }

    pub fn always_failing(message: &'static str) -> Self {
        Self::failing_times(u32::MAX, message)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Build the closure handed to `with_error_recovery`.
    pub fn op(
        &self,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<&'static str, TestError>> + Send>>
    {
        let calls = self.calls.clone();
        let failures = self.failures;
        let message = self.message;
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                if calls.fetch_add(1, Ordering::SeqCst) < failures {
                    Err(TestError(message.to_string()))
                } else {
                    Ok("ok")
                }
            })
        }
    }
}
