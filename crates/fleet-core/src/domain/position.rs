//! The [`Position`] entity: the per-(wallet, coin) running cost-basis ledger.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wei;

/// The per-(wallet, coin) running ledger.
///
/// # Invariants
///
/// - `holdings_raw >= 0` always (clamped at the store boundary, never
///   allowed to underflow).
/// - `buy_count + sell_count >= 1`.
/// - Uniquely identified by `(wallet_id, coin_address)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// The wallet this position belongs to.
    pub wallet_id: i64,
    /// The coin this position tracks.
    pub coin_address: Address,
    /// Cumulative ETH spent buying, in wei.
    #[serde(with = "wei::serde_u256")]
    pub total_cost_wei: U256,
    /// Cumulative ETH received selling, in wei.
    #[serde(with = "wei::serde_u256")]
    pub total_received_wei: U256,
    /// Remaining token units held.
    #[serde(with = "wei::serde_u256")]
    pub holdings_raw: U256,
    /// Number of buy units applied to this position.
    pub buy_count: u32,
    /// Number of sell units applied to this position.
    pub sell_count: u32,
    /// When the first buy or sell touched this position.
    pub first_action_at: DateTime<Utc>,
    /// When the most recent buy or sell touched this position.
    pub last_action_at: DateTime<Utc>,
}

impl Position {
    /// Present profit/loss in basis points relative to cost basis, given a
    /// current valuation of the remaining holdings.
    ///
    /// Returns `None` when `total_cost_wei` is zero (undefined P&L).
    #[must_use]
    pub fn pnl_bps(&self, current_value_wei: U256) -> Option<i64> {
        if self.total_cost_wei.is_zero() {
            return None;
        }
        let cost = i128::try_from(self.total_cost_wei).ok()?;
        let value = i128::try_from(current_value_wei).ok()?;
        let bps = (value - cost).checked_mul(10_000)?.checked_div(cost)?;
        i64::try_from(bps).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn position(cost: u64, received: u64, holdings: u64) -> Position {
        Position {
            wallet_id: 1,
            coin_address: Address::ZERO,
            total_cost_wei: U256::from(cost),
            total_received_wei: U256::from(received),
            holdings_raw: U256::from(holdings),
            buy_count: 1,
            sell_count: 0,
            first_action_at: Utc::now(),
            last_action_at: Utc::now(),
        }
    }

    #[test]
    fn pnl_bps_up_fifteen_percent() {
        let position = position(100, 0, 50);
        assert_eq!(position.pnl_bps(U256::from(115u64)), Some(1_500));
    }

    #[test]
    fn pnl_bps_undefined_with_zero_cost() {
        let position = position(0, 0, 0);
        assert_eq!(position.pnl_bps(U256::from(100u64)), None);
    }

    #[test]
    fn pnl_bps_down_twenty_percent() {
        let position = position(100, 0, 50);
        assert_eq!(position.pnl_bps(U256::from(80u64)), Some(-2_000));
    }
}
