//! SQLite implementation of [`SignalAdapter`].

use std::str::FromStr;

use alloy::primitives::Address;
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use tracing::instrument;

use crate::error::{Result, SignalError};
use crate::ports::SignalAdapter;
use crate::types::{SignalCoin, SignalMode};

#[derive(Debug, FromRow)]
struct SignalCoinRow {
    address: String,
    symbol: String,
    name: String,
    momentum_score: f64,
    swap_count_24h: i64,
    net_flow_usdc_24h: f64,
    volume_24h: f64,
    coin_url: Option<String>,
}

impl TryFrom<SignalCoinRow> for SignalCoin {
    type Error = SignalError;

    fn try_from(row: SignalCoinRow) -> Result<Self> {
        Ok(Self {
            coin_address: Address::from_str(&row.address)
                .map_err(|e| SignalError::CorruptRow(format!("invalid address {:?}: {e}", row.address)))?,
            symbol: row.symbol,
            name: row.name,
            momentum_score: row.momentum_score,
            swaps_24h: row.swap_count_24h.max(0) as u64,
            net_flow_usd_24h: row.net_flow_usdc_24h,
            volume_24h: row.volume_24h,
            coin_url: row.coin_url,
        })
    }
}

const SELECT_COIN_SIGNALS: &str = "SELECT c.address, c.symbol, c.name, \
     a.momentum_score, a.swap_count_24h, a.net_flow_usdc_24h, c.volume_24h, c.coin_url \
     FROM coins c JOIN coin_analytics a ON a.coin_address = c.address";

/// SQLite-backed [`SignalAdapter`], pointed at its own database file.
///
/// Holds no reference to, and has no crate dependency on, `fleet-store`.
#[derive(Debug, Clone)]
pub struct SqliteSignalStore {
    pool: SqlitePool,
}

impl SqliteSignalStore {
    /// Wrap an already-connected pool. Does not run migrations.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply every pending migration under `crates/fleet-signals/migrations`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Migration`] if any migration fails to apply.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SignalAdapter for SqliteSignalStore {
    #[instrument(skip(self))]
    async fn top_movers(&self, limit: u32, min_momentum: f64) -> Result<Vec<SignalCoin>> {
        let query = format!(
            "{SELECT_COIN_SIGNALS} WHERE a.momentum_score >= ? \
             ORDER BY a.momentum_score DESC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, SignalCoinRow>(&query)
            .bind(min_momentum)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(SignalCoin::try_from).collect()
    }

    #[instrument(skip(self), fields(list_name = %list_name))]
    async fn watchlist_signals(&self, list_name: &str, limit: u32) -> Result<Vec<SignalCoin>> {
        let query = format!(
            "{SELECT_COIN_SIGNALS} JOIN coin_watchlist w ON w.coin_address = c.address \
             WHERE w.list_name = ? AND w.enabled = 1 \
             ORDER BY a.momentum_score DESC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, SignalCoinRow>(&query)
            .bind(list_name)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(SignalCoin::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn select_signal_coin(
        &self,
        mode: SignalMode,
        list_name: Option<&str>,
        min_momentum: f64,
    ) -> Result<SignalCoin> {
        let candidates = match mode {
            SignalMode::TopMomentum => self.top_movers(1, min_momentum).await?,
            SignalMode::WatchlistTop => {
                let list_name = list_name
                    .ok_or_else(|| SignalError::CorruptRow("watchlist_top requires a list_name".into()))?;
                self.watchlist_signals(list_name, 1)
                    .await?
                    .into_iter()
                    .filter(|c| c.momentum_score >= min_momentum)
                    .collect()
            }
        };
        candidates.into_iter().next().ok_or(SignalError::NoSignal)
    }

    #[instrument(skip(self), fields(coin = %coin_address))]
    async fn is_coin_in_watchlist(&self, coin_address: Address, list_name: Option<&str>) -> Result<bool> {
        let exists: Option<i64> = match list_name {
            Some(list_name) => {
                sqlx::query_scalar(
                    "SELECT 1 FROM coin_watchlist WHERE coin_address = ? AND list_name = ? AND enabled = 1 LIMIT 1",
                )
                .bind(coin_address.to_string())
                .bind(list_name)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar(
                    "SELECT 1 FROM coin_watchlist WHERE coin_address = ? AND enabled = 1 LIMIT 1",
                )
                .bind(coin_address.to_string())
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(exists.is_some())
    }

    #[instrument(skip(self), fields(list_name = %list_name, coin = %coin_address))]
    async fn add_to_watchlist(&self, list_name: &str, coin_address: Address) -> Result<()> {
        sqlx::query(
            "INSERT INTO coin_watchlist (list_name, coin_address, enabled) VALUES (?, ?, 1) \
             ON CONFLICT (list_name, coin_address) DO UPDATE SET enabled = 1",
        )
        .bind(list_name)
        .bind(coin_address.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(list_name = %list_name, coin = %coin_address))]
    async fn remove_from_watchlist(&self, list_name: &str, coin_address: Address) -> Result<()> {
        sqlx::query(
            "INSERT INTO coin_watchlist (list_name, coin_address, enabled) VALUES (?, ?, 0) \
             ON CONFLICT (list_name, coin_address) DO UPDATE SET enabled = 0",
        )
        .bind(list_name)
        .bind(coin_address.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn sqlite_signal_store_is_send_sync() {
        assert_send_sync::<SqliteSignalStore>();
    }
}
