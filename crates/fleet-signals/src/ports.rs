//! The signal adapter port: the seam the autonomy loop consumes.

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::error::Result;
use crate::types::{SignalCoin, SignalMode};

/// Read-only view over the coin-intelligence store, plus the narrow
/// watchlist-toggle writes the ingester explicitly delegates to this crate.
#[async_trait]
pub trait SignalAdapter: Send + Sync {
    /// The `limit` highest-momentum coins with `momentum_score >= min_momentum`,
    /// sorted descending by momentum score.
    async fn top_movers(&self, limit: u32, min_momentum: f64) -> Result<Vec<SignalCoin>>;

    /// Like [`Self::top_movers`], restricted to enabled rows on `list_name`.
    async fn watchlist_signals(&self, list_name: &str, limit: u32) -> Result<Vec<SignalCoin>>;

    /// One candidate coin chosen per `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SignalError::NoSignal`] if no coin satisfies
    /// `mode` and `min_momentum` (and, for [`SignalMode::WatchlistTop`],
    /// `list_name`).
    async fn select_signal_coin(
        &self,
        mode: SignalMode,
        list_name: Option<&str>,
        min_momentum: f64,
    ) -> Result<SignalCoin>;

    /// Whether `coin_address` is an enabled member of `list_name` (or of any
    /// list, if `list_name` is `None`).
    async fn is_coin_in_watchlist(&self, coin_address: Address, list_name: Option<&str>) -> Result<bool>;

    /// Add (or re-enable) a coin on a watchlist.
    async fn add_to_watchlist(&self, list_name: &str, coin_address: Address) -> Result<()>;

    /// Disable a coin on a watchlist without deleting the row.
    async fn remove_from_watchlist(&self, list_name: &str, coin_address: Address) -> Result<()>;
}
