//! The recovery engine: owns all per-key state and decides what to do with
//! one failure.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use uuid::Uuid;

use crate::adapters::{
    AlertEvent, AlertKind, AlertSink, InMemoryRetryQueue, QueuedRetryJob, RetryQueue,
    TracingAlertSink,
};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::observability::metrics;
use crate::resilience::backoff::BackoffPolicy;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreakers};
use crate::resilience::context::{ErrorCategory, ErrorContext, RecoveryResult, Strategy};
use crate::resilience::fallback::{FallbackResolver, SafeDefault};
use crate::resilience::rate_limit::{RateLimiter, WindowSnapshot};
use crate::resilience::strategy::{self, Signals};
use crate::resilience::tracker::{epoch_millis, CleanupReport, ErrorStats, ErrorTracker};

/// Side effects of a strategy that succeeded in executing.
#[derive(Default)]
struct Execution {
    delay: Option<Duration>,
    fallback: Option<SafeDefault>,
    job: Option<QueuedRetryJob>,
}

/// Error recovery engine.
///
/// Breaker, limiter and tracker state live inside the instance and are
/// process-local; share one engine per process via `Arc`. Cross-instance
/// coordination would need these maps backed by an external store behind
/// the same per-key operations.
pub struct RecoveryEngine {
    pub(crate) config: EngineConfig,
    pub(crate) breakers: CircuitBreakers,
    limiter: RateLimiter,
    tracker: ErrorTracker,
    backoff: BackoffPolicy,
    pub(crate) fallbacks: FallbackResolver,
    queue: Arc<dyn RetryQueue>,
    alerts: Arc<dyn AlertSink>,
    started_at: Instant,
}

pub struct RecoveryEngineBuilder {
    config: EngineConfig,
    fallbacks: FallbackResolver,
    queue: Option<Arc<dyn RetryQueue>>,
    alerts: Option<Arc<dyn AlertSink>>,
}

impl RecoveryEngineBuilder {
    pub fn queue(mut self, queue: Arc<dyn RetryQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn fallbacks(mut self, fallbacks: FallbackResolver) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub fn build(self) -> RecoveryEngine {
        let config = self.config;
        tracing::info!(
            failure_threshold = config.circuit_breaker.failure_threshold,
            reset_timeout_secs = config.circuit_breaker.reset_timeout_secs,
            rate_limit_max = config.rate_limit.max_requests,
            rate_limit_window_ms = config.rate_limit.window_ms,
            max_attempts = config.retries.max_attempts,
            "Recovery engine initialized"
        );
        RecoveryEngine {
            breakers: CircuitBreakers::new(&config.circuit_breaker),
            limiter: RateLimiter::new(&config.rate_limit),
            tracker: ErrorTracker::new(&config.tracker),
            backoff: BackoffPolicy::from_config(&config.retries),
            fallbacks: self.fallbacks,
            queue: self
                .queue
                .unwrap_or_else(|| Arc::new(InMemoryRetryQueue::new())),
            alerts: self.alerts.unwrap_or_else(|| Arc::new(TracingAlertSink)),
            started_at: Instant::now(),
            config,
        }
    }
}

impl RecoveryEngine {
    pub fn builder(config: EngineConfig) -> RecoveryEngineBuilder {
        RecoveryEngineBuilder {
            config,
            fallbacks: FallbackResolver::default(),
            queue: None,
            alerts: None,
        }
    }

    pub fn new(config: EngineConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Decide and carry out recovery for one failure.
    ///
    /// Never fails: problems inside the engine degrade the outcome to
    /// `Escalate` with `success = false`.
    pub async fn handle_error(&self, context: ErrorContext) -> RecoveryResult {
        let started = Instant::now();
        metrics::record_error(context.category, &context.operation);
        self.tracker.track(&context);

        let breaker_key = context.breaker_key();
        if context.category.trips_breaker() {
            self.breakers.record_failure(&breaker_key);
        }

        let strategy = self.select_strategy(&context);
        tracing::debug!(
            operation = %context.operation,
            category = %context.category,
            attempt = context.attempt,
            strategy = %strategy,
            "Strategy selected"
        );

        let (strategy, success, execution) = match self.execute(strategy, &context).await {
            Ok(execution) => (strategy, strategy != Strategy::Escalate, execution),
            Err(e) => {
                tracing::error!(
                    operation = %context.operation,
                    strategy = %strategy,
                    error = %e,
                    "Recovery strategy failed, escalating"
                );
                if strategy != Strategy::Escalate {
                    self.alert(AlertKind::Escalated, Strategy::Escalate, &context, false)
                        .await;
                }
                (Strategy::Escalate, false, Execution::default())
            }
        };
        metrics::record_strategy(strategy);

        self.alert(AlertKind::Handled, strategy, &context, success).await;

        RecoveryResult {
            success,
            strategy,
            final_attempt: context.attempt,
            total_duration: started.elapsed(),
            fallback_used: execution.fallback.is_some(),
            queued_for_retry: execution.job.is_some(),
            error: Some(context.error.to_string()),
            delay: execution.delay,
            fallback: execution.fallback,
            job: execution.job,
        }
    }

    /// Gather live signals lazily and apply the selection rules.
    fn select_strategy(&self, context: &ErrorContext) -> Strategy {
        let breaker_open = self.breakers.is_open(&context.breaker_key());
        let rate_limited = !breaker_open && {
            let key = context.rate_limit_key();
            let denied = !self.limiter.check(&key).is_allowed();
            if denied {
                tracing::warn!(key = %key, "Rate limit exceeded, deferring to queue");
                metrics::record_rate_limited(&context.operation);
            }
            denied
        };
        strategy::select(
            context,
            Signals {
                breaker_open,
                rate_limited,
            },
        )
    }

    async fn execute(&self, strategy: Strategy, context: &ErrorContext) -> EngineResult<Execution> {
        match strategy {
            Strategy::Retry => {
                let delay = self.backoff.delay_for(context.attempt);
                tracing::info!(
                    operation = %context.operation,
                    attempt = context.attempt,
                    delay = ?delay,
                    "Retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                Ok(Execution {
                    delay: Some(delay),
                    ..Default::default()
                })
            }
            Strategy::CircuitBreaker | Strategy::Fallback => Ok(Execution {
                fallback: Some(self.fallback_for(&context.operation)),
                ..Default::default()
            }),
            Strategy::Queue => {
                let job = self.build_job(context)?;
                self.queue.enqueue(job.clone()).await?;
                metrics::record_job_queued(&context.operation);
                tracing::info!(
                    operation = %context.operation,
                    job_id = %job.id,
                    run_at_ms = job.run_at_ms,
                    "Queued for deferred retry"
                );
                Ok(Execution {
                    job: Some(job),
                    ..Default::default()
                })
            }
            Strategy::Ignore => {
                tracing::debug!(
                    operation = %context.operation,
                    category = %context.category,
                    "Error ignored"
                );
                Ok(Execution::default())
            }
            Strategy::Escalate => {
                self.alerts
                    .record(self.event(AlertKind::Escalated, strategy, context, false))
                    .await?;
                Ok(Execution::default())
            }
        }
    }

    fn build_job(&self, context: &ErrorContext) -> EngineResult<QueuedRetryJob> {
        let queue = &self.config.queue;
        let priority = if context.category == ErrorCategory::Webhook {
            queue.webhook_priority
        } else {
            queue.default_priority
        };
        Ok(QueuedRetryJob {
            id: Uuid::new_v4(),
            operation: context.operation.clone(),
            tenant_id: context.tenant_id.clone(),
            payload: serde_json::to_value(context)?,
            priority,
            run_at_ms: epoch_millis() + queue.retry_delay_secs.saturating_mul(1000),
        })
    }

    pub(crate) fn fallback_for(&self, operation: &str) -> SafeDefault {
        metrics::record_fallback(operation);
        self.fallbacks.resolve(operation)
    }

    fn event(
        &self,
        kind: AlertKind,
        strategy: Strategy,
        context: &ErrorContext,
        success: bool,
    ) -> AlertEvent {
        AlertEvent {
            kind,
            strategy,
            context: context.clone(),
            success,
            timestamp_ms: epoch_millis(),
        }
    }

    /// Record an alert, logging rather than propagating sink failures.
    async fn alert(&self, kind: AlertKind, strategy: Strategy, context: &ErrorContext, success: bool) {
        if let Err(e) = self
            .alerts
            .record(self.event(kind, strategy, context, success))
            .await
        {
            tracing::error!(operation = %context.operation, error = %e, "Failed to record alert");
        }
    }

    /// Per-key error statistics.
    pub fn error_statistics(&self) -> BTreeMap<String, ErrorStats> {
        self.tracker.statistics()
    }

    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshots()
    }

    pub fn rate_limit_snapshots(&self) -> Vec<WindowSnapshot> {
        self.limiter.snapshots()
    }

    /// One maintenance pass: prune tracked errors and expired windows.
    pub fn cleanup(&self) -> CleanupReport {
        let report = self.tracker.cleanup();
        let windows = self.limiter.sweep_expired();
        metrics::record_tracked_keys(self.tracker.key_count());
        tracing::debug!(
            entries_removed = report.entries_removed,
            keys_removed = report.keys_removed,
            windows_removed = windows,
            "Cleanup tick"
        );
        report
    }

    /// Run the cleanup ticker until shutdown is signalled.
    pub async fn run_maintenance(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let interval = self.config.tracker.cleanup_interval();
        tracing::info!(interval = ?interval, "Maintenance ticker starting");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.cleanup();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Maintenance ticker received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryAlertSink;
    use crate::error::EngineError;
    use crate::resilience::classifier::classify;
    use crate::resilience::context::{ErrorInfo, OperationContext};
    use async_trait::async_trait;

    struct FailingQueue;

    #[async_trait]
    impl RetryQueue for FailingQueue {
        async fn enqueue(&self, _job: QueuedRetryJob) -> EngineResult<()> {
            Err(EngineError::Queue("broker unreachable".into()))
        }
    }

    fn ctx(operation: &str, message: &str, attempt: u32) -> ErrorContext {
        ErrorContext::new(
            &OperationContext::new(operation).tenant("shop-1"),
            ErrorInfo::new(message),
            classify(message),
            attempt,
            3,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_sleeps_table_delay() {
        let engine = RecoveryEngine::new(EngineConfig::default());
        let before = Instant::now();
        let result = engine.handle_error(ctx("products.get", "ECONNRESET", 1)).await;

        assert_eq!(result.strategy, Strategy::Retry);
        assert!(result.success);
        assert_eq!(result.delay, Some(Duration::from_secs(1)));
        assert!(before.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalate_records_two_alerts() {
        let alerts = Arc::new(MemoryAlertSink::new());
        let engine = RecoveryEngine::builder(EngineConfig::default())
            .alerts(alerts.clone())
            .build();

        let result = engine.handle_error(ctx("products.get", "Unauthorized", 1)).await;
        assert_eq!(result.strategy, Strategy::Escalate);
        assert!(!result.success);
        assert_eq!(result.delay, None);
        assert_eq!(alerts.count(AlertKind::Handled), 1);
        assert_eq!(alerts.count(AlertKind::Escalated), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_failure_degrades_to_escalate() {
        let alerts = Arc::new(MemoryAlertSink::new());
        let engine = RecoveryEngine::builder(EngineConfig::default())
            .queue(Arc::new(FailingQueue))
            .alerts(alerts.clone())
            .build();

        let result = engine.handle_error(ctx("webhook.deliver", "webhook returned 500", 1)).await;
        assert_eq!(result.strategy, Strategy::Escalate);
        assert!(!result.success);
        assert!(!result.queued_for_retry);
        assert_eq!(alerts.count(AlertKind::Escalated), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_builds_job() {
        let queue = Arc::new(InMemoryRetryQueue::new());
        let engine = RecoveryEngine::builder(EngineConfig::default())
            .queue(queue.clone())
            .build();

        let result = engine.handle_error(ctx("webhook.deliver", "webhook returned 500", 1)).await;
        assert_eq!(result.strategy, Strategy::Queue);
        assert!(result.queued_for_retry);

        let jobs = queue.drain();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].priority, 8);
        assert_eq!(jobs[0].tenant_id.as_deref(), Some("shop-1"));
        assert_eq!(jobs[0].payload["operation"], "webhook.deliver");
        assert!(jobs[0].run_at_ms > epoch_millis());
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_does_not_trip_breaker() {
        let mut config = EngineConfig::default();
        config.circuit_breaker.failure_threshold = 1;
        let engine = RecoveryEngine::new(config);

        let result = engine.handle_error(ctx("registry.create", "invalid email", 1)).await;
        assert_eq!(result.strategy, Strategy::Ignore);
        assert!(engine.breaker_snapshots().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_statistics_and_cleanup() {
        let mut config = EngineConfig::default();
        config.tracker.retention_secs = 60;
        config.tracker.cleanup_interval_secs = 10;
        let engine = RecoveryEngine::new(config);

        engine.handle_error(ctx("orders.sync", "query failed", 3)).await;
        let stats = engine.error_statistics();
        assert_eq!(stats["database:orders.sync"].total, 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let report = engine.cleanup();
        assert_eq!(report.keys_removed, 1);
        assert!(engine.error_statistics().is_empty());
        assert!(engine.rate_limit_snapshots().is_empty());
    }
}
