//! Read-only admin API over the engine's observability accessors.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::resilience::RecoveryEngine;

/// State injected into admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub engine: Arc<RecoveryEngine>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(engine: Arc<RecoveryEngine>, api_key: &str) -> Self {
        Self {
            engine,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/stats", get(get_stats))
        .route("/admin/breakers", get(get_breakers))
        .route("/admin/limits", get(get_limits))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware)),
        )
        .with_state(state)
}

/// Serve the admin API until shutdown is signalled.
pub async fn serve_admin(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
