//! Concurrency tests: many callers sharing one engine.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use recovery_engine::resilience::{
    classify, BreakerKey, CircuitState, ErrorCategory, ErrorContext, ErrorInfo, Strategy,
};
use recovery_engine::{EngineConfig, OperationContext, Recovered};
use tokio::time::Instant;

mod common;
use common::{harness, ScriptedOperation};

#[tokio::test(start_paused = true)]
async fn test_independent_keys_back_off_concurrently() {
    let h = harness(EngineConfig::default());

    let started = Instant::now();
    let calls: Vec<_> = (0..50)
        .map(|i| {
            let engine = h.engine.clone();
            let op = ScriptedOperation::failing_times(1, "ECONNRESET");
            tokio::spawn(async move {
                let ctx = OperationContext::new(format!("sync.shop_{i}")).tenant(format!("shop-{i}"));
                let out = engine.with_error_recovery(op.op(), ctx, 3).await;
                (out.map_err(|e| e.0), op.calls())
            })
        })
        .collect();

    for joined in join_all(calls).await {
        let (out, calls) = joined.unwrap();
        assert_eq!(out.unwrap(), Recovered::Value("ok"));
        assert_eq!(calls, 2);
    }

    // Fifty one-second backoffs overlapped instead of queueing behind each other
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_on_one_key_count_exactly() {
    let mut config = EngineConfig::default();
    config.circuit_breaker.failure_threshold = 1000;
    config.rate_limit.max_requests = 10_000;
    let h = harness(config);

    let tasks: Vec<_> = (0..200)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move {
                let info = ErrorInfo::new("deadlock detected");
                let ctx = ErrorContext::new(
                    &OperationContext::new("ledger.write"),
                    info.clone(),
                    classify(&info.message),
                    3,
                    3,
                );
                engine.handle_error(ctx).await
            })
        })
        .collect();
    for joined in join_all(tasks).await {
        let result = joined.unwrap();
        assert_eq!(result.strategy, Strategy::Escalate);
    }

    let key = BreakerKey::new(ErrorCategory::Database, "ledger.write").to_string();
    let breaker = h
        .engine
        .breaker_snapshots()
        .into_iter()
        .find(|b| b.key == key)
        .unwrap();
    assert_eq!(breaker.consecutive_failures, 200);
    assert_eq!(breaker.state, CircuitState::Closed);
    assert_eq!(h.engine.error_statistics()[&key].total, 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rate_limit_admits_exactly_max() {
    let h = harness(EngineConfig::default());

    let tasks: Vec<_> = (0..150)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move {
                let info = ErrorInfo::new("invalid sku");
                let ctx = ErrorContext::new(
                    &OperationContext::new("registry.create").tenant("shop-1"),
                    info,
                    ErrorCategory::Validation,
                    1,
                    3,
                );
                engine.handle_error(ctx).await.strategy
            })
        })
        .collect();

    let strategies: Vec<Strategy> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    let ignored = strategies.iter().filter(|s| **s == Strategy::Ignore).count();
    let queued = strategies.iter().filter(|s| **s == Strategy::Queue).count();
    assert_eq!(ignored, 100);
    assert_eq!(queued, 50);
    assert_eq!(h.queue.len(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_open_breaker_does_not_block_other_operations() {
    let mut config = EngineConfig::default();
    config.circuit_breaker.failure_threshold = 1;
    let h = Arc::new(harness(config));

    let broken = ScriptedOperation::always_failing("connection refused");
    let out = h
        .engine
        .with_error_recovery(broken.op(), OperationContext::new("orders.sync"), 1)
        .await
        .unwrap();
    assert!(out.is_fallback());

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let h = h.clone();
            tokio::spawn(async move {
                let healthy = ScriptedOperation::failing_times(0, "unused");
                h.engine
                    .with_error_recovery(healthy.op(), OperationContext::new(format!("catalog.read_{i}")), 3)
                    .await
                    .map_err(|e| e.0)
            })
        })
        .collect();
    for joined in join_all(tasks).await {
        assert_eq!(joined.unwrap().unwrap(), Recovered::Value("ok"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_expired_breaker_admits_one_trial_under_contention() {
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Barrier;

    const CALLERS: usize = 16;
    let mut config = EngineConfig::default();
    config.circuit_breaker.failure_threshold = 1;
    config.circuit_breaker.reset_timeout_secs = 1;
    let h = harness(config);

    let broken = ScriptedOperation::always_failing("connection refused");
    let out = h
        .engine
        .with_error_recovery(broken.op(), OperationContext::new("orders.sync"), 1)
        .await
        .unwrap();
    assert!(out.is_fallback());
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let invoked = Arc::new(AtomicU32::new(0));
    let barrier = Arc::new(Barrier::new(CALLERS));
    let tasks: Vec<_> = (0..CALLERS)
        .map(|_| {
            let engine = h.engine.clone();
            let invoked = invoked.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                engine
                    .with_error_recovery(
                        move || {
                            let invoked = invoked.clone();
                            async move {
                                invoked.fetch_add(1, Ordering::SeqCst);
                                // Keep the trial in flight while the others arrive
                                tokio::time::sleep(Duration::from_millis(200)).await;
                                Ok::<_, common::TestError>("ok")
                            }
                        },
                        OperationContext::new("orders.sync"),
                        3,
                    )
                    .await
                    .map_err(|e| e.0)
            })
        })
        .collect();

    let outcomes: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(invoked.load(Ordering::SeqCst), 1);
    assert_eq!(outcomes.iter().filter(|o| o.is_value()).count(), 1);
    assert_eq!(outcomes.iter().filter(|o| o.is_fallback()).count(), CALLERS - 1);

    let key = BreakerKey::new(ErrorCategory::Database, "orders.sync").to_string();
    let breaker = h
        .engine
        .breaker_snapshots()
        .into_iter()
        .find(|b| b.key == key)
        .unwrap();
    assert_eq!(breaker.state, CircuitState::Closed);
}
