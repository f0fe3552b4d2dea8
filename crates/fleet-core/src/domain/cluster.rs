//! The [`Cluster`] entity: a named, ordered fleet of non-master wallets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The dispatch strategy a cluster's wallets are driven under.
///
/// Interpreted by the execution engine when it splits `SUPPORT_COIN` /
/// `EXIT_COIN` work across a cluster's wallets (see
/// `fleet_engine::engine::split_shares`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    /// Equal division, all wallets dispatched together.
    Sync,
    /// Equal division, wallets dispatched with a per-index delay.
    Staggered,
    /// Variable per-wallet shares via a bounded jiggle that still sums to the total.
    Momentum,
}

/// A named, ordered group of non-master wallets sharing a strategy mode.
///
/// # Invariants
///
/// - `name` is globally unique.
/// - Membership is many-to-many via a member table; every member must
///   satisfy [`Wallet::is_fleet_member_eligible`](super::Wallet::is_fleet_member_eligible).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Store-assigned identifier.
    pub id: i64,
    /// Unique, human-assigned name (e.g. `"alpha"`).
    pub name: String,
    /// The dispatch strategy applied by the execution engine.
    pub strategy_mode: StrategyMode,
    /// When this cluster was created.
    pub created_at: DateTime<Utc>,
}
