//! Metrics collection and exposition.
//!
//! # Metrics
//! - `recovery_errors_total` (counter): handled failures by category, operation
//! - `recovery_strategy_total` (counter): selected strategies
//! - `recovery_rate_limited_total` (counter): limiter denials by operation
//! - `recovery_fallbacks_total` (counter): safe defaults served by operation
//! - `recovery_jobs_queued_total` (counter): jobs handed to the queue
//! - `recovery_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `recovery_tracked_keys` (gauge): keys held by the error tracker
//!
//! Recording is a no-op until `init_metrics` installs a recorder.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::context::{ErrorCategory, Strategy};

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_error(category: ErrorCategory, operation: &str) {
    counter!(
        "recovery_errors_total",
        "category" => category.as_str(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

pub fn record_strategy(strategy: Strategy) {
    counter!("recovery_strategy_total", "strategy" => strategy.as_str()).increment(1);
}

pub fn record_rate_limited(operation: &str) {
    counter!("recovery_rate_limited_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_fallback(operation: &str) {
    counter!("recovery_fallbacks_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_job_queued(operation: &str) {
    counter!("recovery_jobs_queued_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("recovery_breaker_state", "breaker" => breaker.to_string()).set(value);
}

pub fn record_tracked_keys(count: usize) {
    gauge!("recovery_tracked_keys").set(count as f64);
}
