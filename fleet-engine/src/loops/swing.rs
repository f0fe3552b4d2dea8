//! The swing loop: watches live P&L against each enabled `SwingConfig`'s
//! triggers and synthesizes `EXIT_COIN` operations through the normal funnel.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use chrono::Utc;
use fleet_core::domain::{OperationPayload, OperationType, StrategyMode, SwingConfig};
use fleet_core::Scheduler;
use fleet_store::{ClusterStore, OperationStore, PositionStore, SwingConfigStore, SwingConfigUpdate};

use crate::auto_approve;
use crate::config::{AutoApproveSettings, PolicySettings};
use crate::engine::ExecutionEngine;
use crate::policy::{self, Intent, PolicyContext};

use super::{spawn_loop, LastTick, LoopHandle};

/// Requester id recorded on every operation this loop creates.
pub const REQUESTED_BY: &str = "swing-worker";

/// Collaborators the swing loop needs on every tick.
pub struct SwingDeps {
    /// Swing config persistence.
    pub swing_configs: Arc<dyn SwingConfigStore>,
    /// Position (cost-basis) persistence.
    pub positions: Arc<dyn PositionStore>,
    /// Cluster lookups (fleet name to id, and membership size).
    pub clusters: Arc<dyn ClusterStore>,
    /// Operation persistence.
    pub operations: Arc<dyn OperationStore>,
    /// A quoting capability, used to value remaining holdings.
    pub quoter: Arc<dyn fleet_core::ports::SwapEncoder>,
    /// The execution engine driving approved operations.
    pub engine: Arc<ExecutionEngine>,
    /// Policy thresholds.
    pub policy: PolicySettings,
    /// Auto-approver settings.
    pub auto_approve: AutoApproveSettings,
    /// This loop's own tuning.
    pub interval_sec: u64,
}

/// Spawn the swing loop as a long-lived task.
#[must_use]
pub fn spawn(deps: SwingDeps) -> LoopHandle {
    let interval = Duration::from_secs(deps.interval_sec);
    let deps = Arc::new(deps);
    spawn_loop("swing", interval, Scheduler::new(), move || {
        let deps = Arc::clone(&deps);
        async move { run_tick(&deps).await }
    })
}

async fn run_tick(deps: &SwingDeps) -> LastTick {
    let mut tick = LastTick::starting(chrono::Utc::now());

    let configs = match deps.swing_configs.list_swing_configs(true).await {
        Ok(configs) => configs,
        Err(error) => {
            tick.errors.push(format!("listing swing configs: {error}"));
            return tick;
        }
    };

    for config in configs {
        if let Err(error) = run_one_config(deps, &config, &mut tick).await {
            tick.errors.push(format!(
                "swing config {} ({}/{}): {error}",
                config.id, config.fleet_name, config.coin_address
            ));
        }
    }

    tick
}

/// What a P&L evaluation against a [`SwingConfig`]'s triggers decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    TakeProfit,
    StopLoss,
    TrailingStop,
}

fn evaluate_trigger(config: &SwingConfig, pnl_bps: i64) -> Option<Trigger> {
    if pnl_bps >= i64::from(config.take_profit_bps) {
        return Some(Trigger::TakeProfit);
    }
    if pnl_bps <= -i64::from(config.stop_loss_bps) {
        return Some(Trigger::StopLoss);
    }
    if let (Some(trailing_stop_bps), Some(peak_pnl_bps)) = (config.trailing_stop_bps, config.peak_pnl_bps) {
        if pnl_bps < peak_pnl_bps && peak_pnl_bps - pnl_bps >= i64::from(trailing_stop_bps) {
            return Some(Trigger::TrailingStop);
        }
    }
    None
}

async fn run_one_config(deps: &SwingDeps, config: &SwingConfig, tick: &mut LastTick) -> Result<(), String> {
    let now = Utc::now();
    if config.in_cooldown(now) {
        return Ok(());
    }

    let cluster = deps
        .clusters
        .get_cluster_by_name(&config.fleet_name)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("no cluster named {:?}", config.fleet_name))?;

    let (total_cost_wei, holdings_raw) = aggregate_position(deps, cluster.id, config.coin_address).await?;

    if total_cost_wei.is_zero() {
        return Ok(());
    }

    let current_value_wei = deps
        .quoter
        .quote_coin_to_eth(config.coin_address, holdings_raw)
        .await
        .map_err(|e| e.to_string())?;

    let Some(pnl_bps) = pnl_bps(total_cost_wei, current_value_wei) else {
        return Ok(());
    };

    let new_peak = config.peak_pnl_bps.map_or(pnl_bps, |peak| peak.max(pnl_bps));
    if Some(new_peak) != config.peak_pnl_bps {
        let update = SwingConfigUpdate {
            peak_pnl_bps: Some(Some(new_peak)),
            ..SwingConfigUpdate::default()
        };
        deps.swing_configs
            .update_swing_config(config.id, update)
            .await
            .map_err(|e| e.to_string())?;
    }

    let mut config = config.clone();
    config.peak_pnl_bps = Some(new_peak);

    let Some(_trigger) = evaluate_trigger(&config, pnl_bps) else {
        return Ok(());
    };

    let members = deps
        .clusters
        .list_cluster_wallet_details(cluster.id)
        .await
        .map_err(|e| e.to_string())?;

    let intent = Intent {
        cluster_id: cluster.id,
        wallet_count: members.len(),
        amount_wei: holdings_raw,
        coin_address: Some(config.coin_address),
        slippage_bps: Some(config.slippage_bps),
    };

    let cluster_age_sec = deps
        .operations
        .get_latest_cluster_operation_age_sec(cluster.id, None)
        .await
        .map_err(|e| e.to_string())?;

    policy::evaluate(
        &intent,
        OperationType::ExitCoin,
        &deps.policy,
        PolicyContext {
            cluster_age_sec,
            coin_in_watchlist: None,
        },
    )?;

    let payload = OperationPayload::ExitCoin {
        cluster_id: cluster.id,
        coin_address: config.coin_address,
        total_amount_wei: holdings_raw,
        slippage_bps: config.slippage_bps,
        strategy_mode: StrategyMode::Sync,
    };

    let operation = deps
        .operations
        .create_operation(OperationType::ExitCoin, cluster.id, REQUESTED_BY, payload.clone())
        .await
        .map_err(|e| e.to_string())?;

    let decision = auto_approve::decide(&payload, REQUESTED_BY, &deps.auto_approve);
    if !decision.allow {
        tracing::debug!(operation_id = operation.id, reason = %decision.reason, "swing exit not auto-approved");
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

    deps.swing_configs
        .update_swing_config(
            config.id,
            SwingConfigUpdate {
                peak_pnl_bps: Some(None),
                last_action_at: Some(now),
                ..SwingConfigUpdate::default()
            },
        )
        .await
        .map_err(|e| e.to_string())?;

    tick.executed_operation_ids.push(operation.id);
    Ok(())
}

/// Sum cost basis and remaining holdings across a cluster's member wallets
/// for one coin, the position a [`SwingConfig`] actually tracks.
async fn aggregate_position(deps: &SwingDeps, cluster_id: i64, coin_address: Address) -> Result<(U256, U256), String> {
    let positions = deps
        .positions
        .list_positions_by_cluster(cluster_id)
        .await
        .map_err(|e| e.to_string())?;

    let mut total_cost_wei = U256::ZERO;
    let mut holdings_raw = U256::ZERO;
    for position in positions.into_iter().filter(|p| p.coin_address == coin_address) {
        total_cost_wei += position.total_cost_wei;
        holdings_raw += position.holdings_raw;
    }
    Ok((total_cost_wei, holdings_raw))
}

fn pnl_bps(total_cost_wei: U256, current_value_wei: U256) -> Option<i64> {
    if total_cost_wei.is_zero() {
        return None;
    }
    let cost = i128::try_from(total_cost_wei).ok()?;
    let value = i128::try_from(current_value_wei).ok()?;
    let bps = (value - cost).checked_mul(10_000)?.checked_div(cost)?;
    i64::try_from(bps).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(take_profit: u32, stop_loss: u32, trailing: Option<u32>, peak: Option<i64>) -> SwingConfig {
        SwingConfig {
            id: 1,
            fleet_name: "alpha".into(),
            coin_address: Address::ZERO,
            take_profit_bps: take_profit,
            stop_loss_bps: stop_loss,
            trailing_stop_bps: trailing,
            cooldown_sec: 60,
            slippage_bps: 100,
            enabled: true,
            peak_pnl_bps: peak,
            last_action_at: None,
        }
    }

    #[test]
    fn take_profit_wins_over_trailing_stop() {
        let config = config(1_500, 2_000, Some(500), Some(2_000));
        assert_eq!(evaluate_trigger(&config, 1_500), Some(Trigger::TakeProfit));
    }

    #[test]
    fn stop_loss_triggers_below_negative_threshold() {
        let config = config(1_500, 2_000, None, None);
        assert_eq!(evaluate_trigger(&config, -2_000), Some(Trigger::StopLoss));
        assert_eq!(evaluate_trigger(&config, -1_999), None);
    }

    #[test]
    fn trailing_stop_fires_on_retreat_from_peak() {
        let config = config(5_000, 5_000, Some(500), Some(3_000));
        assert_eq!(evaluate_trigger(&config, 2_500), Some(Trigger::TrailingStop));
        assert_eq!(evaluate_trigger(&config, 2_600), None);
    }

    #[test]
    fn trailing_stop_is_inert_without_a_peak() {
        let config = config(5_000, 5_000, Some(500), None);
        assert_eq!(evaluate_trigger(&config, -100), None);
    }

    #[test]
    fn no_trigger_within_all_bounds() {
        let config = config(1_500, 2_000, Some(500), Some(1_000));
        assert_eq!(evaluate_trigger(&config, 800), None);
    }

    #[test]
    fn pnl_bps_matches_fifteen_percent_gain() {
        assert_eq!(pnl_bps(U256::from(100u64), U256::from(115u64)), Some(1_500));
    }

    #[test]
    fn pnl_bps_undefined_with_zero_cost() {
        assert_eq!(pnl_bps(U256::ZERO, U256::from(100u64)), None);
    }
}
