use axum::{extract::State, Json};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::admin::AdminState;
use crate::resilience::rate_limit::WindowSnapshot;
use crate::resilience::{BreakerSnapshot, ErrorStats};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub open_breakers: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let open_breakers = state
        .engine
        .breaker_snapshots()
        .iter()
        .filter(|b| b.state != crate::resilience::CircuitState::Closed)
        .count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if open_breakers == 0 { "operational" } else { "degraded" },
        uptime_secs: state.engine.uptime().as_secs(),
        open_breakers,
    })
}

pub async fn get_stats(State(state): State<AdminState>) -> Json<BTreeMap<String, ErrorStats>> {
    Json(state.engine.error_statistics())
}

pub async fn get_breakers(State(state): State<AdminState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.engine.breaker_snapshots())
}

pub async fn get_limits(State(state): State<AdminState>) -> Json<Vec<WindowSnapshot>> {
    Json(state.engine.rate_limit_snapshots())
}
