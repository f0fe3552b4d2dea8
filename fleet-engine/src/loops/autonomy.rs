//! The autonomy loop: turns ranked coin signals into `SUPPORT_COIN`
//! operations, one candidate per configured cluster per tick.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use fleet_core::domain::{OperationPayload, OperationType, StrategyMode};
use fleet_core::Scheduler;
use fleet_signals::{SignalAdapter, SignalMode};
use fleet_store::{ClusterStore, OperationStore};

use crate::auto_approve;
use crate::config::{AutonomySettings, AutoApproveSettings, PolicySettings};
use crate::engine::ExecutionEngine;
use crate::policy::{self, Intent, PolicyContext};

use super::{spawn_loop, LastTick, LoopHandle};

/// Requester id recorded on every operation this loop creates.
pub const REQUESTED_BY: &str = "autonomy-worker";

/// Collaborators the autonomy loop needs on every tick.
pub struct AutonomyDeps {
    /// Operation persistence.
    pub operations: Arc<dyn OperationStore>,
    /// Cluster membership lookups (for the per-wallet share cap).
    pub clusters: Arc<dyn ClusterStore>,
    /// Read-only coin-intelligence view.
    pub signals: Arc<dyn SignalAdapter>,
    /// The execution engine driving approved operations.
    pub engine: Arc<ExecutionEngine>,
    /// Policy thresholds.
    pub policy: PolicySettings,
    /// Auto-approver settings.
    pub auto_approve: AutoApproveSettings,
    /// This loop's own tuning (interval, mode, target clusters, amount, slippage).
    pub autonomy: AutonomySettings,
}

/// Spawn the autonomy loop as a long-lived task.
#[must_use]
pub fn spawn(deps: AutonomyDeps) -> LoopHandle {
    let interval = Duration::from_secs(deps.autonomy.interval_sec);
    let deps = Arc::new(deps);
    spawn_loop("autonomy", interval, Scheduler::new(), move || {
        let deps = Arc::clone(&deps);
        async move { run_tick(&deps).await }
    })
}

async fn run_tick(deps: &AutonomyDeps) -> LastTick {
    let mut tick = LastTick::starting(chrono::Utc::now());

    let mode = match deps.autonomy.mode.as_str() {
        "watchlist_top" => SignalMode::WatchlistTop,
        _ => SignalMode::TopMomentum,
    };
    let strategy_mode = parse_strategy_mode(&deps.autonomy.strategy_mode);
    let amount_wei = crate::config::parse_wei_or_zero(&deps.autonomy.amount_wei);

    for &cluster_id in &deps.autonomy.cluster_ids {
        if let Err(error) = run_one_cluster(deps, cluster_id, mode, strategy_mode, amount_wei, &mut tick).await {
            tick.errors.push(format!("cluster {cluster_id}: {error}"));
        }
    }

    tick
}

async fn run_one_cluster(
    deps: &AutonomyDeps,
    cluster_id: i64,
    mode: SignalMode,
    strategy_mode: StrategyMode,
    amount_wei: U256,
    tick: &mut LastTick,
) -> Result<(), String> {
    let candidate = deps
        .signals
        .select_signal_coin(mode, deps.autonomy.watchlist_name.as_deref(), deps.autonomy.min_momentum)
        .await
        .map_err(|e| e.to_string())?;

    let members = deps
        .clusters
        .list_cluster_wallet_details(cluster_id)
        .await
        .map_err(|e| e.to_string())?;

    let intent = Intent {
        cluster_id,
        wallet_count: members.len(),
        amount_wei,
        coin_address: Some(candidate.coin_address),
        slippage_bps: Some(deps.autonomy.slippage_bps),
    };

    let coin_in_watchlist = deps
        .signals
        .is_coin_in_watchlist(candidate.coin_address, deps.autonomy.watchlist_name.as_deref())
        .await
        .unwrap_or(false);
    let cluster_age_sec = deps
        .operations
        .get_latest_cluster_operation_age_sec(cluster_id, None)
        .await
        .map_err(|e| e.to_string())?;

    policy::evaluate(
        &intent,
        OperationType::SupportCoin,
        &deps.policy,
        PolicyContext {
            cluster_age_sec,
            coin_in_watchlist: Some(coin_in_watchlist),
        },
    )?;

    let payload = OperationPayload::SupportCoin {
        cluster_id,
        coin_address: candidate.coin_address,
        total_amount_wei: amount_wei,
        slippage_bps: deps.autonomy.slippage_bps,
        strategy_mode,
    };

    let operation = deps
        .operations
        .create_operation(OperationType::SupportCoin, cluster_id, REQUESTED_BY, payload.clone())
        .await
        .map_err(|e| e.to_string())?;

    let decision = auto_approve::decide(&payload, REQUESTED_BY, &deps.auto_approve);
    if !decision.allow {
        tracing::debug!(operation_id = operation.id, reason = %decision.reason, "autonomy candidate not auto-approved");
        return Ok(());
    }

    deps.operations
        .set_operation_approved(operation.id, REQUESTED_BY)
        .await
        .map_err(|e| e.to_string())?;

    deps.engine
        .execute_operation(operation.id)
        .await
        .map_err(|e| e.to_string())?;

    tick.executed_operation_ids.push(operation.id);
    Ok(())
}

fn parse_strategy_mode(raw: &str) -> StrategyMode {
    match raw {
        "staggered" => StrategyMode::Staggered,
        "momentum" => StrategyMode::Momentum,
        _ => StrategyMode::Sync,
    }
}
