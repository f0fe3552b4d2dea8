//! Fleet controller service entry point.
//!
//! Boots the operation lifecycle and execution engine, starts the autonomy
//! and swing loop tasks per configuration, and runs until a shutdown signal
//! arrives.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fleet_engine::service;
use tracing::{error, info, warn};

/// Fleet controller: operation lifecycle, execution engine, autonomy/swing loops.
#[derive(Parser, Debug)]
#[command(name = "fleet-engine")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to an optional TOML configuration file; `FLEET_`-prefixed
    /// environment variables always take precedence over it.
    #[arg(short, long, env = "FLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, env = "FLEET_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON.
    #[arg(long, env = "FLEET_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _ = dotenvy::dotenv();
    init_logging(&args.log_level, args.json_logs)?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting fleet-engine");

    let services = service::boot(args.config.as_deref())
        .await
        .context("boot failed")?;

    info!(
        autonomy_running = services.readiness().autonomy_running,
        swing_running = services.readiness().swing_running,
        "fleet-engine ready"
    );

    let shutdown = setup_shutdown_handler();
    shutdown.await;
    info!("shutdown signal received, draining loop tasks");
    services.shutdown().await;

    info!("fleet-engine stopped");
    Ok(())
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
    }

    Ok(())
}

async fn setup_shutdown_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            warn!("received ctrl-c, initiating graceful shutdown");
        }
        () = terminate => {
            warn!("received sigterm, initiating graceful shutdown");
        }
    }
}
