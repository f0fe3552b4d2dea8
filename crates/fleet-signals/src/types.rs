//! Types returned by the signal adapter.

use alloy::primitives::Address;

/// One coin-intelligence row, joined from `coins` and `coin_analytics`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalCoin {
    /// The coin's on-chain address.
    pub coin_address: Address,
    /// Ticker symbol.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Momentum score; higher is more favorable. Sort key for `topMovers`.
    pub momentum_score: f64,
    /// Swap count over the trailing 24 hours.
    pub swaps_24h: u64,
    /// Net USDC flow over the trailing 24 hours (signed; negative is net selling).
    pub net_flow_usd_24h: f64,
    /// Trading volume over the trailing 24 hours, in USD.
    pub volume_24h: f64,
    /// A display link for the coin, if the ingester populated one.
    pub coin_url: Option<String>,
}

/// The selection strategy for [`crate::SignalAdapter::select_signal_coin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMode {
    /// Highest momentum score across all known coins.
    TopMomentum,
    /// Highest momentum score restricted to one watchlist.
    WatchlistTop,
}
