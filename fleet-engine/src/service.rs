//! Boot sequence and the `Services` aggregate.
//!
//! Load configuration, open storage, wire collaborators through explicit
//! constructor injection (no singletons), and hand back a running process
//! with its loop tasks already started. Each periodic driver is its own
//! task (see `crate::loops`), so `Services` holds a [`LoopHandle`] per loop
//! rather than owning any loop body itself.

use std::path::Path;
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, instrument, warn};

use fleet_store::{OperationStore, WalletStore};

use crate::accounts::StubAccountProvider;
use crate::bundler::http::HttpBundlerAdapter;
use crate::bundler::{BundlerRouter, BundlerTiming};
use crate::config::FleetConfig;
use crate::engine::ExecutionEngine;
use crate::error::{ConfigError, FleetServiceError, Result};
use crate::loops::{autonomy, swing, LoopHandle};
use crate::swaps::StubSwapEncoder;

/// A fully booted process: the engine, both stores, and the two loop tasks.
pub struct Services {
    /// The primary durable store.
    pub store: Arc<fleet_store::SqliteStore>,
    /// The read-only signal-intelligence store.
    pub signals: Arc<fleet_signals::SqliteSignalStore>,
    /// The operation state machine's driver.
    pub engine: Arc<ExecutionEngine>,
    autonomy_loop: Option<LoopHandle>,
    swing_loop: Option<LoopHandle>,
}

impl Services {
    /// Readiness snapshot: store reachability, whether each loop is running,
    /// and the age of each loop's last tick.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        Readiness {
            autonomy_running: self.autonomy_loop.is_some(),
            swing_running: self.swing_loop.is_some(),
            autonomy_last_tick: self.autonomy_loop.as_ref().map(|h| h.last_tick.borrow().clone()),
            swing_last_tick: self.swing_loop.as_ref().map(|h| h.last_tick.borrow().clone()),
        }
    }

    /// Signal every running loop to stop after its in-flight tick, and await
    /// their exit. Per the concurrency model, this never interrupts a tick
    /// already underway.
    pub async fn shutdown(self) {
        if let Some(handle) = self.autonomy_loop {
            handle.shutdown().await;
        }
        if let Some(handle) = self.swing_loop {
            handle.shutdown().await;
        }
    }
}

/// A point-in-time readiness snapshot, surfaced by an operator-facing health
/// check.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Readiness {
    /// Whether the autonomy loop task is running.
    pub autonomy_running: bool,
    /// Whether the swing loop task is running.
    pub swing_running: bool,
    /// The autonomy loop's last tick, if it has run at least once.
    pub autonomy_last_tick: Option<crate::loops::LastTick>,
    /// The swing loop's last tick, if it has run at least once.
    pub swing_last_tick: Option<crate::loops::LastTick>,
}

/// Load configuration, open storage, verify the master wallet, wire
/// collaborators, and start the configured loop tasks.
///
/// # Errors
///
/// Returns a fatal [`FleetServiceError`] for any boot-time failure: a
/// configuration load/validation error, a store/migration failure, or a
/// `KEY_MISMATCH` between the persisted and configured master wallet
/// address. None of these mutate durable state.
#[instrument(skip(config_file_path))]
pub async fn boot(config_file_path: Option<&Path>) -> Result<Services> {
    let config = FleetConfig::load(config_file_path).map_err(ConfigError::from)?;
    config.validate().map_err(ConfigError::from)?;

    info!(service = %config.service.name, "configuration loaded");

    let store = Arc::new(open_primary_store(&config.service.primary_store_path).await?);
    let signals = Arc::new(open_signal_store(&config.service.signal_store_path).await?);

    verify_master_wallet(&store, &config).await?;

    let bundler = Arc::new(build_bundler_router(&config));
    let accounts = Arc::new(StubAccountProvider::new(bundler));
    let swaps = Arc::new(StubSwapEncoder);

    let engine = Arc::new(ExecutionEngine::new(
        store.clone() as Arc<dyn OperationStore>,
        store.clone() as Arc<dyn fleet_store::ClusterStore>,
        store.clone() as Arc<dyn fleet_store::LedgerStore>,
        store.clone() as Arc<dyn fleet_store::PositionStore>,
        accounts,
        swaps.clone() as Arc<dyn fleet_core::ports::SwapEncoder>,
        config.policy.clone(),
        config.signer.effective_concurrency(),
    ));

    let autonomy_loop = config.autonomy.enabled.then(|| {
        autonomy::spawn(autonomy::AutonomyDeps {
            operations: store.clone() as Arc<dyn OperationStore>,
            clusters: store.clone() as Arc<dyn fleet_store::ClusterStore>,
            signals: signals.clone() as Arc<dyn fleet_signals::SignalAdapter>,
            engine: Arc::clone(&engine),
            policy: config.policy.clone(),
            auto_approve: config.auto_approve.clone(),
            autonomy: config.autonomy.clone(),
        })
    });

    let swing_loop = config.swing.enabled.then(|| {
        swing::spawn(swing::SwingDeps {
            swing_configs: store.clone() as Arc<dyn fleet_store::SwingConfigStore>,
            positions: store.clone() as Arc<dyn fleet_store::PositionStore>,
            clusters: store.clone() as Arc<dyn fleet_store::ClusterStore>,
            operations: store.clone() as Arc<dyn OperationStore>,
            quoter: swaps as Arc<dyn fleet_core::ports::SwapEncoder>,
            engine: Arc::clone(&engine),
            policy: config.policy.clone(),
            auto_approve: config.auto_approve.clone(),
            interval_sec: config.swing.interval_sec,
        })
    });

    if autonomy_loop.is_none() {
        warn!("autonomy loop disabled by configuration");
    }
    if swing_loop.is_none() {
        warn!("swing loop disabled by configuration");
    }

    Ok(Services {
        store,
        signals,
        engine,
        autonomy_loop,
        swing_loop,
    })
}

async fn open_primary_store(path: &str) -> Result<fleet_store::SqliteStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{path}?mode=rwc"))
        .await
        .map_err(|e| FleetServiceError::Internal(format!("opening primary store at {path}: {e}")))?;
    let store = fleet_store::SqliteStore::new(pool);
    store.run_migrations().await?;
    Ok(store)
}

async fn open_signal_store(path: &str) -> Result<fleet_signals::SqliteSignalStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{path}?mode=rwc"))
        .await
        .map_err(|e| FleetServiceError::Internal(format!("opening signal store at {path}: {e}")))?;
    let store = fleet_signals::SqliteSignalStore::new(pool);
    store.run_migrations().await?;
    Ok(store)
}

async fn verify_master_wallet(store: &fleet_store::SqliteStore, config: &FleetConfig) -> Result<()> {
    let Some(expected_raw) = &config.service.master_wallet_address else {
        return Ok(());
    };
    let expected: alloy::primitives::Address = expected_raw
        .parse()
        .map_err(|_| FleetServiceError::Internal(format!("invalid master_wallet_address {expected_raw:?}")))?;

    let Some(master) = store.get_master_wallet().await? else {
        return Ok(());
    };

    if master.address != expected {
        return Err(fleet_core::FleetError::KeyMismatch(format!(
            "persisted master wallet {} does not match configured address {expected}",
            master.address
        ))
        .into());
    }
    Ok(())
}

fn build_bundler_router(config: &FleetConfig) -> BundlerRouter {
    let primary = Arc::new(HttpBundlerAdapter::new("primary", config.bundler.primary_url.clone()));
    let secondary = config
        .bundler
        .secondary_url
        .as_ref()
        .map(|url| Arc::new(HttpBundlerAdapter::new("secondary", url.clone())) as Arc<dyn fleet_core::ports::BundlerAdapter>);

    let timing = BundlerTiming {
        send_timeout: std::time::Duration::from_millis(config.bundler.send_timeout_ms),
        hedge_delay: std::time::Duration::from_millis(config.bundler.hedge_delay_ms),
        receipt_poll_interval: std::time::Duration::from_millis(config.bundler.receipt_poll_ms),
        receipt_timeout: std::time::Duration::from_millis(config.bundler.receipt_timeout_ms),
    };

    BundlerRouter::new(primary, secondary, timing)
}
