//! Recovery engine daemon.
//!
//! Hosts a `RecoveryEngine` with its maintenance ticker and the read-only
//! admin API. Services embed the engine as a library; the daemon exists so
//! its statistics can be scraped and inspected alongside them.
//!
//! ```text
//!   config.toml ─▶ loader ─▶ EngineConfig
//!                              │
//!                              ▼
//!   ┌──────────────────────────────────────────────┐
//!   │               RecoveryEngine                  │
//!   │  classifier · breakers · limiter · tracker    │
//!   └───────┬───────────────────────┬──────────────┘
//!           │                       │
//!    maintenance ticker        admin API (axum)
//!    (cleanup every 30s)       /admin/{status,stats,breakers,limits}
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use recovery_engine::admin::{serve_admin, AdminState};
use recovery_engine::config::{load_config, EngineConfig};
use recovery_engine::lifecycle::{wait_for_signal, Shutdown};
use recovery_engine::observability::{logging, metrics};
use recovery_engine::RecoveryEngine;

#[derive(Parser)]
#[command(name = "recovery-engine")]
#[command(about = "Error recovery engine daemon", long_about = None)]
struct Args {
    /// Path to a TOML configuration file (defaults are used when omitted).
    #[arg(short, long, env = "RECOVERY_ENGINE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "recovery-engine starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let engine = Arc::new(RecoveryEngine::new(config.clone()));
    let shutdown = Shutdown::new();

    let maintenance = engine.clone();
    shutdown.spawn("maintenance", move |rx| maintenance.run_maintenance(rx));

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(engine.clone(), &config.admin.api_key);
        shutdown.spawn("admin", move |rx| async move {
            if let Err(e) = serve_admin(listener, state, rx).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    wait_for_signal().await;
    shutdown.trigger();
    if !shutdown.drain(Duration::from_secs(10)).await {
        tracing::warn!("Some background tasks did not stop cleanly");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
