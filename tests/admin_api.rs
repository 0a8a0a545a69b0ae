//! Admin API served over a real listener.

use std::sync::Arc;

use recovery_engine::admin::{serve_admin, AdminState};
use recovery_engine::resilience::{ErrorCategory, ErrorContext, ErrorInfo};
use recovery_engine::{EngineConfig, OperationContext, RecoveryEngine, Shutdown};
use tokio::net::TcpListener;

const KEY: &str = "test-admin-key";

async fn start_admin(engine: Arc<RecoveryEngine>) -> (String, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = Shutdown::new();
    let state = AdminState::new(engine, KEY);
    shutdown.spawn("admin", move |rx| async move {
        serve_admin(listener, state, rx).await.unwrap();
    });
    (base, shutdown)
}

#[tokio::test]
async fn test_requests_without_key_are_rejected() {
    let engine = Arc::new(RecoveryEngine::new(EngineConfig::default()));
    let (base, shutdown) = start_admin(engine).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/admin/status")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{base}/admin/status"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    shutdown.trigger();
    shutdown.drain(std::time::Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_status_and_stats_reflect_engine_state() {
    let mut config = EngineConfig::default();
    config.circuit_breaker.failure_threshold = 1;
    let engine = Arc::new(RecoveryEngine::new(config));

    let info = ErrorInfo::new("connection reset by peer");
    let ctx = ErrorContext::new(
        &OperationContext::new("orders.sync").tenant("shop-1"),
        info,
        ErrorCategory::Database,
        3,
        3,
    );
    engine.handle_error(ctx).await;

    let (base, shutdown) = start_admin(engine).await;
    let client = reqwest::Client::new();
    let get = |path: &'static str| {
        client
            .get(format!("{base}{path}"))
            .bearer_auth(KEY)
            .send()
    };

    let resp = get("/admin/status").await.unwrap();
    assert_eq!(resp.status(), 200);
    let status: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(status["status"], "degraded");
    assert_eq!(status["open_breakers"], 1);

    let stats: serde_json::Value = get("/admin/stats").await.unwrap().json().await.unwrap();
    assert_eq!(stats["database:orders.sync"]["total"], 1);

    let breakers: serde_json::Value = get("/admin/breakers").await.unwrap().json().await.unwrap();
    assert_eq!(breakers[0]["key"], "database:orders.sync");
    assert_eq!(breakers[0]["state"], "open");

    let limits: serde_json::Value = get("/admin/limits").await.unwrap().json().await.unwrap();
    assert_eq!(limits.as_array().map(Vec::len), Some(0));

    shutdown.trigger();
    assert!(shutdown.drain(std::time::Duration::from_secs(5)).await);
}
