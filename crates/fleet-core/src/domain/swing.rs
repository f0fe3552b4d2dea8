//! The [`SwingConfig`] entity: per-(fleet, coin) auto-exit rules.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-(fleet, coin) auto-exit rules evaluated by the swing loop.
///
/// Unique on `(fleet_name, coin_address)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingConfig {
    /// Store-assigned identifier.
    pub id: i64,
    /// The cluster (fleet) this config applies to.
    pub fleet_name: String,
    /// The coin this config applies to.
    pub coin_address: Address,
    /// Take-profit trigger, in basis points (positive).
    pub take_profit_bps: u32,
    /// Stop-loss trigger, stored positive, applied negatively.
    pub stop_loss_bps: u32,
    /// Trailing-stop distance from the running peak, in basis points.
    pub trailing_stop_bps: Option<u32>,
    /// Minimum seconds between two triggered exits for the same config.
    pub cooldown_sec: u64,
    /// Slippage tolerance applied to the synthesized exit, in basis points.
    pub slippage_bps: u32,
    /// Whether the swing loop considers this config at all.
    pub enabled: bool,
    /// Running maximum observed P&L in basis points, reset after each exit.
    pub peak_pnl_bps: Option<i64>,
    /// When this config last triggered an exit.
    pub last_action_at: Option<DateTime<Utc>>,
}

impl SwingConfig {
    /// Whether this config is still within its post-trigger cooldown window.
    #[must_use]
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match self.last_action_at {
            Some(last) => {
                let elapsed = (now - last).num_seconds().max(0) as u64;
                elapsed < self.cooldown_sec
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config(cooldown_sec: u64, last_action_at: Option<DateTime<Utc>>) -> SwingConfig {
        SwingConfig {
            id: 1,
            fleet_name: "alpha".into(),
            coin_address: Address::ZERO,
            take_profit_bps: 1_500,
            stop_loss_bps: 2_000,
            trailing_stop_bps: None,
            cooldown_sec,
            slippage_bps: 100,
            enabled: true,
            peak_pnl_bps: None,
            last_action_at,
        }
    }

    #[test]
    fn never_triggered_is_not_in_cooldown() {
        assert!(!config(60, None).in_cooldown(Utc::now()));
    }

    #[test]
    fn exactly_at_cooldown_boundary_is_clear() {
        let now = Utc::now();
        let config = config(60, Some(now - Duration::seconds(60)));
        assert!(!config.in_cooldown(now));
    }

    #[test]
    fn inside_cooldown_window() {
        let now = Utc::now();
        let config = config(60, Some(now - Duration::seconds(30)));
        assert!(config.in_cooldown(now));
    }
}
