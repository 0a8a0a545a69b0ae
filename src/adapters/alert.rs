//! Audit / alert sink seam.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;

use crate::error::{EngineError, EngineResult};
use crate::resilience::context::{ErrorContext, Strategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Every failure the engine handles.
    Handled,
    /// A failure that needs operator attention.
    Escalated,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub strategy: Strategy,
    pub context: ErrorContext,
    pub success: bool,
    pub timestamp_ms: u64,
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn record(&self, event: AlertEvent) -> EngineResult<()>;
}

/// Writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn record(&self, event: AlertEvent) -> EngineResult<()> {
        let ctx = &event.context;
        match event.kind {
            AlertKind::Handled => tracing::info!(
                operation = %ctx.operation,
                category = %ctx.category,
                strategy = %event.strategy,
                attempt = ctx.attempt,
                tenant_id = ctx.tenant_id.as_deref().unwrap_or("global"),
                success = event.success,
                error = %ctx.error,
                "Error handled"
            ),
            AlertKind::Escalated => tracing::error!(
                operation = %ctx.operation,
                category = %ctx.category,
                attempt = ctx.attempt,
                tenant_id = ctx.tenant_id.as_deref().unwrap_or("global"),
                user_id = ctx.user_id.as_deref().unwrap_or("-"),
                error = %ctx.error,
                "Error escalated for operator attention"
            ),
        }
        Ok(())
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    events: Mutex<Vec<AlertEvent>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, kind: AlertKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn record(&self, event: AlertEvent) -> EngineResult<()> {
        self.events
            .lock()
            .map_err(|_| EngineError::Alert("alert mutex poisoned".into()))?
            .push(event);
        Ok(())
    }
}
