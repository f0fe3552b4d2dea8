//! Policy: a pure decision over an intent, a snapshot of configuration, and
//! whatever cluster/coin facts the caller already looked up.
//!
//! Nothing in this module touches a store or a clock. Callers (the autonomy
//! loop, the swing loop, the execution engine's `assert_execution_allowed`
//! re-check) gather the cluster-cooldown age and watchlist membership first,
//! then call [`evaluate`]. This keeps the decision itself table-testable:
//! same inputs, same verdict, every time.

use alloy::primitives::{Address, U256};
use fleet_core::domain::OperationType;

use crate::config::PolicySettings;

/// The intent shape Policy decides over.
#[derive(Debug, Clone)]
pub struct Intent {
    /// Target cluster.
    pub cluster_id: i64,
    /// Number of wallets the amount will be divided (or applied) across.
    pub wallet_count: usize,
    /// `FUNDING_REQUEST`: the absolute per-wallet amount. `SUPPORT_COIN` /
    /// `EXIT_COIN`: the operation's total amount.
    pub amount_wei: U256,
    /// The target coin, for `SUPPORT_COIN` / `EXIT_COIN`.
    pub coin_address: Option<Address>,
    /// Requested slippage tolerance, in basis points.
    pub slippage_bps: Option<u32>,
}

/// Everything Policy needs about a cluster's recent history and a coin's
/// watchlist standing, looked up by the caller before evaluating.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyContext {
    /// Seconds since the cluster's most recent terminal operation, or `None`
    /// if it has never completed one.
    pub cluster_age_sec: Option<i64>,
    /// Whether the intent's coin is present on the configured watchlist.
    /// Irrelevant (and ignored) unless `require_watchlist_coin` is set.
    pub coin_in_watchlist: Option<bool>,
}

/// Admit the intent, or reject it with a human-readable reason.
///
/// The reason is suitable to embed directly in a
/// [`fleet_core::FleetError::PolicyReject`] message.
///
/// # Errors
///
/// Returns `Err(reason)` on the first rule that fires, in the order: kill
/// switch, value caps, slippage bounds, coin allowlist, watchlist
/// requirement, cluster cooldown.
pub fn evaluate(
    intent: &Intent,
    operation_type: OperationType,
    config: &PolicySettings,
    context: PolicyContext,
) -> Result<(), String> {
    if config.kill_switch {
        return Err("kill switch is active".into());
    }

    check_value_caps(intent, operation_type, config)?;

    if let Some(slippage_bps) = intent.slippage_bps {
        if slippage_bps == 0 || slippage_bps > config.max_slippage_bps {
            return Err(format!(
                "slippage {slippage_bps} bps outside allowed range [1, {}]",
                config.max_slippage_bps
            ));
        }
    }

    if let Some(coin) = intent.coin_address {
        if let Some(allowed) = allowed_coins(config) {
            if !allowed.contains(&coin) {
                return Err(format!("coin {coin} is not on the allowlist"));
            }
        }
        if config.require_watchlist_coin && !context.coin_in_watchlist.unwrap_or(false) {
            let list = config.require_watchlist_name.as_deref().unwrap_or("<unset>");
            return Err(format!("coin {coin} is not on watchlist {list:?}"));
        }
    }

    if let Some(age_sec) = context.cluster_age_sec {
        let cooldown = config.cluster_cooldown_sec;
        let elapsed = u64::try_from(age_sec).unwrap_or(u64::MAX);
        if elapsed < cooldown {
            return Err(format!(
                "cluster cooldown active ({age_sec}s elapsed, requires {cooldown}s)"
            ));
        }
    }

    Ok(())
}

fn check_value_caps(intent: &Intent, operation_type: OperationType, config: &PolicySettings) -> Result<(), String> {
    let max_funding = crate::config::parse_wei_or_zero(&config.max_funding_wei);
    let max_trade = crate::config::parse_wei_or_zero(&config.max_trade_wei);
    let max_per_wallet = crate::config::parse_wei_or_zero(&config.max_per_wallet_wei);

    match operation_type {
        OperationType::FundingRequest => {
            if intent.amount_wei > max_funding {
                return Err(format!("funding amount {} exceeds max {max_funding}", intent.amount_wei));
            }
            if intent.amount_wei > max_per_wallet {
                return Err(format!(
                    "per-wallet funding amount {} exceeds max {max_per_wallet}",
                    intent.amount_wei
                ));
            }
        }
        OperationType::SupportCoin | OperationType::ExitCoin => {
            if intent.amount_wei > max_trade {
                return Err(format!("trade amount {} exceeds max {max_trade}", intent.amount_wei));
            }
            if intent.wallet_count > 0 {
                let per_wallet = intent.amount_wei / U256::from(intent.wallet_count as u64);
                if per_wallet > max_per_wallet {
                    return Err(format!(
                        "per-wallet trade share {per_wallet} exceeds max {max_per_wallet}"
                    ));
                }
            }
        }
    }
    Ok(())
}

fn allowed_coins(config: &PolicySettings) -> Option<Vec<Address>> {
    if config.allowed_coin_addresses.is_empty() {
        return None;
    }
    Some(
        config
            .allowed_coin_addresses
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FleetConfig;

    fn settings() -> PolicySettings {
        FleetConfig::load(None).expect("defaults").policy
    }

    fn intent() -> Intent {
        Intent {
            cluster_id: 1,
            wallet_count: 2,
            amount_wei: U256::from(10u64).pow(U256::from(14u64)),
            coin_address: Some(Address::repeat_byte(0xC)),
            slippage_bps: Some(100),
        }
    }

    #[test]
    fn admits_a_plain_support_coin_intent() {
        let result = evaluate(&intent(), OperationType::SupportCoin, &settings(), PolicyContext::default());
        assert!(result.is_ok());
    }

    #[test]
    fn kill_switch_rejects_everything() {
        let mut config = settings();
        config.kill_switch = true;
        let result = evaluate(&intent(), OperationType::SupportCoin, &config, PolicyContext::default());
        assert!(result.unwrap_err().contains("kill switch"));
    }

    #[test]
    fn slippage_boundary_one_and_max_admit() {
        let config = settings();
        let mut low = intent();
        low.slippage_bps = Some(1);
        assert!(evaluate(&low, OperationType::SupportCoin, &config, PolicyContext::default()).is_ok());

        let mut high = intent();
        high.slippage_bps = Some(config.max_slippage_bps);
        assert!(evaluate(&high, OperationType::SupportCoin, &config, PolicyContext::default()).is_ok());
    }

    #[test]
    fn slippage_boundary_zero_and_over_max_reject() {
        let config = settings();
        let mut zero = intent();
        zero.slippage_bps = Some(0);
        assert!(evaluate(&zero, OperationType::SupportCoin, &config, PolicyContext::default()).is_err());

        let mut over = intent();
        over.slippage_bps = Some(config.max_slippage_bps + 1);
        assert!(evaluate(&over, OperationType::SupportCoin, &config, PolicyContext::default()).is_err());
    }

    #[test]
    fn trade_value_boundary_at_max_admits_over_max_rejects() {
        let mut config = settings();
        config.max_trade_wei = "1000".into();
        config.max_per_wallet_wei = "1000".into();

        let mut at_max = intent();
        at_max.wallet_count = 1;
        at_max.amount_wei = U256::from(1000u64);
        assert!(evaluate(&at_max, OperationType::SupportCoin, &config, PolicyContext::default()).is_ok());

        let mut over_max = intent();
        over_max.wallet_count = 1;
        over_max.amount_wei = U256::from(1001u64);
        assert!(evaluate(&over_max, OperationType::SupportCoin, &config, PolicyContext::default()).is_err());
    }

    #[test]
    fn cooldown_boundary_exact_admits_one_under_rejects() {
        let mut config = settings();
        config.cluster_cooldown_sec = 45;

        let admits = PolicyContext {
            cluster_age_sec: Some(45),
            coin_in_watchlist: None,
        };
        assert!(evaluate(&intent(), OperationType::SupportCoin, &config, admits).is_ok());

        let rejects = PolicyContext {
            cluster_age_sec: Some(44),
            coin_in_watchlist: None,
        };
        let result = evaluate(&intent(), OperationType::SupportCoin, &config, rejects);
        assert!(result.unwrap_err().contains("cooldown active"));
    }

    #[test]
    fn watchlist_requirement_rejects_when_absent() {
        let mut config = settings();
        config.require_watchlist_coin = true;
        config.require_watchlist_name = Some("momentum".into());

        let context = PolicyContext {
            cluster_age_sec: None,
            coin_in_watchlist: Some(false),
        };
        let result = evaluate(&intent(), OperationType::SupportCoin, &config, context);
        assert!(result.unwrap_err().contains("watchlist"));
    }

    #[test]
    fn coin_allowlist_rejects_an_unlisted_coin() {
        let mut config = settings();
        config.allowed_coin_addresses = vec![Address::repeat_byte(0xAA).to_string()];
        let result = evaluate(&intent(), OperationType::SupportCoin, &config, PolicyContext::default());
        assert!(result.unwrap_err().contains("allowlist"));
    }

    #[test]
    fn funding_request_checks_absolute_per_wallet_amount() {
        let mut config = settings();
        config.max_funding_wei = "500".into();
        config.max_per_wallet_wei = "10000".into();

        let mut request = intent();
        request.coin_address = None;
        request.slippage_bps = None;
        request.amount_wei = U256::from(501u64);
        let result = evaluate(&request, OperationType::FundingRequest, &config, PolicyContext::default());
        assert!(result.unwrap_err().contains("funding amount"));
    }
}
