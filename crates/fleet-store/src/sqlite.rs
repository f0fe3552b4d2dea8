//! SQLite implementation of the store ports using `sqlx`.
//!
//! # Type Conversions
//!
//! SQLite has no native address, 256-bit integer, or enum column types.
//! Addresses and hashes are stored as their `0x`-prefixed hex text,
//! 256-bit quantities as base-10 decimal text (see [`fleet_core::wei`]),
//! timestamps as RFC 3339 text, and enums as their lowercase tag text.
//! Every row struct below is paired with a `TryFrom` that performs this
//! parsing once, at the store boundary; nothing upstream of
//! [`SqliteStore`] ever sees a raw row.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use std::str::FromStr;

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_core::domain::{
    Cluster, FundingRecord, Operation, OperationPayload, OperationStatus, OperationType, Position,
    StrategyMode, SwingConfig, Trade, TradeStatus, Wallet, WalletType,
};
use sqlx::error::DatabaseError as _;
use sqlx::{FromRow, Row, SqlitePool};
use tracing::instrument;

use crate::error::{Result, StoreError};
use crate::ports::{
    ClusterStore, LedgerStore, OperationStore, PositionStore, SwingConfigStore, SwingConfigUpdate,
    WalletStore,
};

// ═══════════════════════════════════════════════════════════════════════════════
// SMALL ENUM <-> TEXT MAPPINGS
// ═══════════════════════════════════════════════════════════════════════════════

fn wallet_type_to_str(t: WalletType) -> &'static str {
    match t {
        WalletType::Smart => "smart",
    }
}

fn wallet_type_from_str(s: &str) -> Result<WalletType> {
    match s {
        "smart" => Ok(WalletType::Smart),
        other => Err(StoreError::CorruptRow(format!("unknown wallet_type {other:?}"))),
    }
}

fn strategy_mode_to_str(m: StrategyMode) -> &'static str {
    match m {
        StrategyMode::Sync => "sync",
        StrategyMode::Staggered => "staggered",
        StrategyMode::Momentum => "momentum",
    }
}

fn strategy_mode_from_str(s: &str) -> Result<StrategyMode> {
    match s {
        "sync" => Ok(StrategyMode::Sync),
        "staggered" => Ok(StrategyMode::Staggered),
        "momentum" => Ok(StrategyMode::Momentum),
        other => Err(StoreError::CorruptRow(format!("unknown strategy_mode {other:?}"))),
    }
}

fn operation_type_to_str(t: OperationType) -> &'static str {
    match t {
        OperationType::FundingRequest => "funding_request",
        OperationType::SupportCoin => "support_coin",
        OperationType::ExitCoin => "exit_coin",
    }
}

fn operation_status_to_str(s: OperationStatus) -> &'static str {
    match s {
        OperationStatus::Pending => "pending",
        OperationStatus::Approved => "approved",
        OperationStatus::Executing => "executing",
        OperationStatus::Complete => "complete",
        OperationStatus::Partial => "partial",
        OperationStatus::Failed => "failed",
        OperationStatus::Cancelled => "cancelled",
    }
}

fn operation_status_from_str(s: &str) -> Result<OperationStatus> {
    match s {
        "pending" => Ok(OperationStatus::Pending),
        "approved" => Ok(OperationStatus::Approved),
        "executing" => Ok(OperationStatus::Executing),
        "complete" => Ok(OperationStatus::Complete),
        "partial" => Ok(OperationStatus::Partial),
        "failed" => Ok(OperationStatus::Failed),
        "cancelled" => Ok(OperationStatus::Cancelled),
        other => Err(StoreError::CorruptRow(format!("unknown operation status {other:?}"))),
    }
}

fn trade_status_to_str(s: TradeStatus) -> &'static str {
    match s {
        TradeStatus::Complete => "complete",
        TradeStatus::Failed => "failed",
    }
}

fn trade_status_from_str(s: &str) -> Result<TradeStatus> {
    match s {
        "complete" => Ok(TradeStatus::Complete),
        "failed" => Ok(TradeStatus::Failed),
        other => Err(StoreError::CorruptRow(format!("unknown trade status {other:?}"))),
    }
}

fn parse_address(s: &str) -> Result<Address> {
    Address::from_str(s).map_err(|e| StoreError::CorruptRow(format!("invalid address {s:?}: {e}")))
}

fn parse_u256(s: &str) -> Result<U256> {
    fleet_core::wei::parse_wei(s).map_err(|e| StoreError::CorruptRow(format!("invalid wei amount: {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow(format!("invalid timestamp {s:?}: {e}")))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

// ═══════════════════════════════════════════════════════════════════════════════
// SQLITE STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// SQLite-based implementation of every store port.
///
/// Holds a single [`SqlitePool`]; callers construct the pool with
/// `max_connections(1)` for the writer (WAL allows concurrent readers
/// regardless) per the single-writer model.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an already-connected pool. Does not run migrations.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for callers that need a raw connection (health
    /// checks, ad hoc diagnostics).
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply every pending migration under `crates/fleet-store/migrations`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] if any migration fails to apply.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WALLET STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct WalletRow {
    id: i64,
    name: String,
    address: String,
    owner_address: String,
    provider_account_name: String,
    wallet_type: String,
    is_master: i64,
    created_at: String,
}

impl TryFrom<WalletRow> for Wallet {
    type Error = StoreError;

    fn try_from(row: WalletRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            address: parse_address(&row.address)?,
            owner_address: parse_address(&row.owner_address)?,
            provider_account_name: row.provider_account_name,
            wallet_type: wallet_type_from_str(&row.wallet_type)?,
            is_master: row.is_master != 0,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[async_trait]
impl WalletStore for SqliteStore {
    #[instrument(skip(self), fields(name = %name))]
    async fn create_wallet(
        &self,
        name: &str,
        address: Address,
        owner_address: Address,
        provider_account_name: &str,
        wallet_type: WalletType,
        is_master: bool,
    ) -> Result<Wallet> {
        let now = format_timestamp(Utc::now());
        let id = sqlx::query(
            "INSERT INTO wallets (name, address, owner_address, provider_account_name, \
             wallet_type, is_master, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(address.to_string())
        .bind(owner_address.to_string())
        .bind(provider_account_name)
        .bind(wallet_type_to_str(wallet_type))
        .bind(i64::from(is_master))
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() && is_master => {
                StoreError::AlreadyExists("a master wallet already exists".into())
            }
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::AlreadyExists(format!("wallet {name:?}"))
            }
            other => StoreError::Database(other),
        })?
        .last_insert_rowid();

        self.get_wallet_by_id(id)
            .await?
            .ok_or_else(|| StoreError::CorruptRow("wallet vanished after insert".into()))
    }

    #[instrument(skip(self))]
    async fn get_master_wallet(&self) -> Result<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE is_master = 1 LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        row.map(Wallet::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_wallets(&self) -> Result<Vec<Wallet>> {
        let rows = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Wallet::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn get_wallet_by_id(&self, id: i64) -> Result<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Wallet::try_from).transpose()
    }

    #[instrument(skip(self), fields(name = %name))]
    async fn get_wallet_by_name(&self, name: &str) -> Result<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Wallet::try_from).transpose()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLUSTER STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct ClusterRow {
    id: i64,
    name: String,
    strategy_mode: String,
    created_at: String,
}

impl TryFrom<ClusterRow> for Cluster {
    type Error = StoreError;

    fn try_from(row: ClusterRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            strategy_mode: strategy_mode_from_str(&row.strategy_mode)?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[async_trait]
impl ClusterStore for SqliteStore {
    #[instrument(skip(self), fields(name = %name))]
    async fn create_cluster(&self, name: &str, strategy_mode: StrategyMode) -> Result<Cluster> {
        let now = format_timestamp(Utc::now());
        let id = sqlx::query(
            "INSERT INTO clusters (name, strategy_mode, created_at) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(strategy_mode_to_str(strategy_mode))
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::AlreadyExists(format!("cluster {name:?}"))
            }
            other => StoreError::Database(other),
        })?
        .last_insert_rowid();

        self.get_cluster_by_id(id)
            .await?
            .ok_or_else(|| StoreError::CorruptRow("cluster vanished after insert".into()))
    }

    #[instrument(skip(self), fields(name = %name))]
    async fn get_cluster_by_name(&self, name: &str) -> Result<Option<Cluster>> {
        let row = sqlx::query_as::<_, ClusterRow>("SELECT * FROM clusters WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Cluster::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn get_cluster_by_id(&self, id: i64) -> Result<Option<Cluster>> {
        let row = sqlx::query_as::<_, ClusterRow>("SELECT * FROM clusters WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Cluster::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        let rows = sqlx::query_as::<_, ClusterRow>("SELECT * FROM clusters ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Cluster::try_from).collect()
    }

    #[instrument(skip(self, wallet_ids))]
    async fn set_cluster_wallets(&self, cluster_id: i64, wallet_ids: &[i64]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for &wallet_id in wallet_ids {
            let is_master: Option<i64> =
                sqlx::query_scalar("SELECT is_master FROM wallets WHERE id = ?")
                    .bind(wallet_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            match is_master {
                None => return Err(StoreError::NotFound(format!("wallet {wallet_id}"))),
                Some(flag) if flag != 0 => {
                    return Err(StoreError::StateConflict(format!(
                        "wallet {wallet_id} is the master wallet and cannot join a cluster"
                    )));
                }
                Some(_) => {}
            }
        }

        sqlx::query("DELETE FROM cluster_wallets WHERE cluster_id = ?")
            .bind(cluster_id)
            .execute(&mut *tx)
            .await?;

        for (position, &wallet_id) in wallet_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO cluster_wallets (cluster_id, wallet_id, position) VALUES (?, ?, ?)",
            )
            .bind(cluster_id)
            .bind(wallet_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_cluster_wallet_details(&self, cluster_id: i64) -> Result<Vec<Wallet>> {
        let rows = sqlx::query_as::<_, WalletRow>(
            "SELECT w.* FROM wallets w \
             JOIN cluster_wallets cw ON cw.wallet_id = w.id \
             WHERE cw.cluster_id = ? ORDER BY cw.position ASC",
        )
        .bind(cluster_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Wallet::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn delete_cluster(&self, cluster_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM clusters WHERE id = ?")
            .bind(cluster_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATION STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct OperationRow {
    id: i64,
    cluster_id: i64,
    status: String,
    requested_by: String,
    approved_by: Option<String>,
    payload_json: String,
    result_json: Option<String>,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<OperationRow> for Operation {
    type Error = StoreError;

    fn try_from(row: OperationRow) -> Result<Self> {
        let payload: OperationPayload = serde_json::from_str(&row.payload_json)
            .map_err(|e| StoreError::CorruptRow(format!("invalid payload_json: {e}")))?;
        let result = row
            .result_json
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| StoreError::CorruptRow(format!("invalid result_json: {e}")))?;

        Ok(Self {
            id: row.id,
            operation_type: payload.operation_type(),
            cluster_id: row.cluster_id,
            status: operation_status_from_str(&row.status)?,
            requested_by: row.requested_by,
            approved_by: row.approved_by,
            payload,
            result,
            error_message: row.error_message,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl OperationStore for SqliteStore {
    #[instrument(skip(self, payload), fields(cluster_id))]
    async fn create_operation(
        &self,
        operation_type: OperationType,
        cluster_id: i64,
        requested_by: &str,
        payload: OperationPayload,
    ) -> Result<Operation> {
        let now = format_timestamp(Utc::now());
        let payload_json = serde_json::to_string(&payload)?;
        let id = sqlx::query(
            "INSERT INTO operations (operation_type, cluster_id, status, requested_by, \
             payload_json, created_at, updated_at) VALUES (?, ?, 'pending', ?, ?, ?, ?)",
        )
        .bind(operation_type_to_str(operation_type))
        .bind(cluster_id)
        .bind(requested_by)
        .bind(&payload_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get_operation_by_id(id)
            .await?
            .ok_or_else(|| StoreError::CorruptRow("operation vanished after insert".into()))
    }

    #[instrument(skip(self, error_message))]
    async fn update_operation_status(
        &self,
        id: i64,
        new_status: OperationStatus,
        error_message: Option<&str>,
    ) -> Result<Operation> {
        let current = self
            .get_operation_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("operation {id}")))?;

        if !current.status.can_transition_to(new_status) {
            return Err(StoreError::StateConflict(format!(
                "operation {id}: cannot move from {:?} to {new_status:?}",
                current.status
            )));
        }

        let now = format_timestamp(Utc::now());
        sqlx::query(
            "UPDATE operations SET status = ?, error_message = COALESCE(?, error_message), \
             updated_at = ? WHERE id = ?",
        )
        .bind(operation_status_to_str(new_status))
        .bind(error_message)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_operation_by_id(id)
            .await?
            .ok_or_else(|| StoreError::CorruptRow("operation vanished after update".into()))
    }

    #[instrument(skip(self, approved_by))]
    async fn set_operation_approved(&self, id: i64, approved_by: &str) -> Result<Operation> {
        let current = self
            .get_operation_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("operation {id}")))?;

        if !current.status.can_transition_to(OperationStatus::Approved) {
            return Err(StoreError::StateConflict(format!(
                "operation {id}: cannot approve from {:?}",
                current.status
            )));
        }

        let now = format_timestamp(Utc::now());
        sqlx::query(
            "UPDATE operations SET status = 'approved', approved_by = ?, updated_at = ? WHERE id = ?",
        )
        .bind(approved_by)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_operation_by_id(id)
            .await?
            .ok_or_else(|| StoreError::CorruptRow("operation vanished after approval".into()))
    }

    #[instrument(skip(self))]
    async fn cancel_operation(&self, id: i64) -> Result<Operation> {
        self.update_operation_status(id, OperationStatus::Cancelled, None).await
    }

    #[instrument(skip(self, result, error_message))]
    async fn set_operation_result(
        &self,
        id: i64,
        status: OperationStatus,
        result: serde_json::Value,
        error_message: Option<&str>,
    ) -> Result<Operation> {
        let current = self
            .get_operation_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("operation {id}")))?;

        if !current.status.can_transition_to(status) {
            return Err(StoreError::StateConflict(format!(
                "operation {id}: cannot move from {:?} to {status:?}",
                current.status
            )));
        }

        let now = format_timestamp(Utc::now());
        let result_json = serde_json::to_string(&result)?;
        sqlx::query(
            "UPDATE operations SET status = ?, result_json = ?, error_message = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(operation_status_to_str(status))
        .bind(&result_json)
        .bind(error_message)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_operation_by_id(id)
            .await?
            .ok_or_else(|| StoreError::CorruptRow("operation vanished after result set".into()))
    }

    #[instrument(skip(self))]
    async fn list_operations(&self, limit: u32) -> Result<Vec<Operation>> {
        let rows = sqlx::query_as::<_, OperationRow>(
            "SELECT * FROM operations ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Operation::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn get_operation_by_id(&self, id: i64) -> Result<Option<Operation>> {
        let row = sqlx::query_as::<_, OperationRow>("SELECT * FROM operations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Operation::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn get_latest_cluster_operation_age_sec(
        &self,
        cluster_id: i64,
        exclude_operation_id: Option<i64>,
    ) -> Result<Option<i64>> {
        let row = sqlx::query(
            "SELECT updated_at FROM operations \
             WHERE cluster_id = ? AND status IN ('complete', 'partial', 'failed', 'cancelled') \
             AND (? IS NULL OR id != ?) \
             ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(cluster_id)
        .bind(exclude_operation_id)
        .bind(exclude_operation_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let updated_at: String = row.try_get("updated_at")?;
        let updated_at = parse_timestamp(&updated_at)?;
        Ok(Some((Utc::now() - updated_at).num_seconds().max(0)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER STORE (trades + funding)
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct TradeRow {
    id: i64,
    wallet_id: i64,
    from_token: String,
    to_token: String,
    amount_in: String,
    amount_out: Option<String>,
    user_op_hash: Option<String>,
    tx_hash: Option<String>,
    status: String,
    error_message: Option<String>,
    created_at: String,
}

impl TryFrom<TradeRow> for Trade {
    type Error = StoreError;

    fn try_from(row: TradeRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            wallet_id: row.wallet_id,
            from_token: parse_address(&row.from_token)?,
            to_token: parse_address(&row.to_token)?,
            amount_in: parse_u256(&row.amount_in)?,
            amount_out: row.amount_out.as_deref().map(parse_u256).transpose()?,
            user_op_hash: row.user_op_hash,
            tx_hash: row
                .tx_hash
                .as_deref()
                .map(|s| {
                    TxHash::from_str(s)
                        .map_err(|e| StoreError::CorruptRow(format!("invalid tx_hash {s:?}: {e}")))
                })
                .transpose()?,
            status: trade_status_from_str(&row.status)?,
            error_message: row.error_message,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct FundingRow {
    id: i64,
    wallet_id: i64,
    amount_wei: String,
    user_op_hash: Option<String>,
    tx_hash: Option<String>,
    status: String,
    error_message: Option<String>,
    created_at: String,
}

impl TryFrom<FundingRow> for FundingRecord {
    type Error = StoreError;

    fn try_from(row: FundingRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            wallet_id: row.wallet_id,
            amount_wei: parse_u256(&row.amount_wei)?,
            user_op_hash: row.user_op_hash,
            tx_hash: row
                .tx_hash
                .as_deref()
                .map(|s| {
                    TxHash::from_str(s)
                        .map_err(|e| StoreError::CorruptRow(format!("invalid tx_hash {s:?}: {e}")))
                })
                .transpose()?,
            status: trade_status_from_str(&row.status)?,
            error_message: row.error_message,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    #[instrument(skip(self, error_message), fields(wallet_id))]
    async fn create_trade(
        &self,
        wallet_id: i64,
        from_token: Address,
        to_token: Address,
        amount_in: U256,
        amount_out: Option<U256>,
        user_op_hash: Option<&str>,
        tx_hash: Option<TxHash>,
        status: TradeStatus,
        error_message: Option<&str>,
    ) -> Result<Trade> {
        let now = format_timestamp(Utc::now());
        let id = sqlx::query(
            "INSERT INTO trades (wallet_id, from_token, to_token, amount_in, amount_out, \
             user_op_hash, tx_hash, status, error_message, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(wallet_id)
        .bind(from_token.to_string())
        .bind(to_token.to_string())
        .bind(amount_in.to_string())
        .bind(amount_out.map(|a| a.to_string()))
        .bind(user_op_hash)
        .bind(tx_hash.map(|h| h.to_string()))
        .bind(trade_status_to_str(status))
        .bind(error_message)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let row = sqlx::query_as::<_, TradeRow>("SELECT * FROM trades WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Trade::try_from(row)
    }

    #[instrument(skip(self, error_message), fields(wallet_id))]
    async fn create_funding(
        &self,
        wallet_id: i64,
        amount_wei: U256,
        user_op_hash: Option<&str>,
        tx_hash: Option<TxHash>,
        status: TradeStatus,
        error_message: Option<&str>,
    ) -> Result<FundingRecord> {
        let now = format_timestamp(Utc::now());
        let id = sqlx::query(
            "INSERT INTO funding_txs (wallet_id, amount_wei, user_op_hash, tx_hash, status, \
             error_message, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(wallet_id)
        .bind(amount_wei.to_string())
        .bind(user_op_hash)
        .bind(tx_hash.map(|h| h.to_string()))
        .bind(trade_status_to_str(status))
        .bind(error_message)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let row = sqlx::query_as::<_, FundingRow>("SELECT * FROM funding_txs WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        FundingRecord::try_from(row)
    }

    #[instrument(skip(self))]
    async fn list_trades(&self) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, TradeRow>(
            "SELECT * FROM trades ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Trade::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn list_funding(&self) -> Result<Vec<FundingRecord>> {
        let rows = sqlx::query_as::<_, FundingRow>(
            "SELECT * FROM funding_txs ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(FundingRecord::try_from).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSITION STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct PositionRow {
    wallet_id: i64,
    coin_address: String,
    total_cost_wei: String,
    total_received_wei: String,
    holdings_raw: String,
    buy_count: i64,
    sell_count: i64,
    first_action_at: String,
    last_action_at: String,
}

impl TryFrom<PositionRow> for Position {
    type Error = StoreError;

    fn try_from(row: PositionRow) -> Result<Self> {
        Ok(Self {
            wallet_id: row.wallet_id,
            coin_address: parse_address(&row.coin_address)?,
            total_cost_wei: parse_u256(&row.total_cost_wei)?,
            total_received_wei: parse_u256(&row.total_received_wei)?,
            holdings_raw: parse_u256(&row.holdings_raw)?,
            buy_count: row.buy_count as u32,
            sell_count: row.sell_count as u32,
            first_action_at: parse_timestamp(&row.first_action_at)?,
            last_action_at: parse_timestamp(&row.last_action_at)?,
        })
    }
}

#[async_trait]
impl PositionStore for SqliteStore {
    #[instrument(skip(self), fields(wallet_id, coin = %coin_address))]
    async fn upsert_position(
        &self,
        wallet_id: i64,
        coin_address: Address,
        cost_delta: U256,
        received_delta: U256,
        holdings_delta: U256,
        is_buy: bool,
    ) -> Result<Position> {
        let mut tx = self.pool.begin().await?;
        let now = format_timestamp(Utc::now());
        let coin_str = coin_address.to_string();

        let existing = sqlx::query_as::<_, PositionRow>(
            "SELECT * FROM positions WHERE wallet_id = ? AND coin_address = ?",
        )
        .bind(wallet_id)
        .bind(&coin_str)
        .fetch_optional(&mut *tx)
        .await?;

        let (total_cost, total_received, holdings, buy_count, sell_count, first_action_at) =
            match existing {
                Some(row) => (
                    parse_u256(&row.total_cost_wei)?,
                    parse_u256(&row.total_received_wei)?,
                    parse_u256(&row.holdings_raw)?,
                    row.buy_count,
                    row.sell_count,
                    row.first_action_at,
                ),
                None => (U256::ZERO, U256::ZERO, U256::ZERO, 0, 0, now.clone()),
            };

        let new_cost = total_cost.saturating_add(cost_delta);
        let new_received = total_received.saturating_add(received_delta);
        let (new_holdings, new_buy_count, new_sell_count) = if is_buy {
            (holdings.saturating_add(holdings_delta), buy_count + 1, sell_count)
        } else {
            if holdings_delta > holdings {
                tracing::warn!(
                    wallet_id,
                    coin = %coin_address,
                    holdings = %holdings,
                    holdings_delta = %holdings_delta,
                    "sell holdings_delta exceeds remaining holdings, clamping to zero"
                );
            }
            (holdings.saturating_sub(holdings_delta), buy_count, sell_count + 1)
        };

        sqlx::query(
            "INSERT INTO positions (wallet_id, coin_address, total_cost_wei, \
             total_received_wei, holdings_raw, buy_count, sell_count, first_action_at, \
             last_action_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (wallet_id, coin_address) DO UPDATE SET \
             total_cost_wei = excluded.total_cost_wei, \
             total_received_wei = excluded.total_received_wei, \
             holdings_raw = excluded.holdings_raw, \
             buy_count = excluded.buy_count, \
             sell_count = excluded.sell_count, \
             last_action_at = excluded.last_action_at",
        )
        .bind(wallet_id)
        .bind(&coin_str)
        .bind(new_cost.to_string())
        .bind(new_received.to_string())
        .bind(new_holdings.to_string())
        .bind(new_buy_count)
        .bind(new_sell_count)
        .bind(&first_action_at)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_position(wallet_id, coin_address)
            .await?
            .ok_or_else(|| StoreError::CorruptRow("position vanished after upsert".into()))
    }

    #[instrument(skip(self))]
    async fn list_positions_by_wallet(&self, wallet_id: i64) -> Result<Vec<Position>> {
        let rows = sqlx::query_as::<_, PositionRow>(
            "SELECT * FROM positions WHERE wallet_id = ? ORDER BY coin_address ASC",
        )
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Position::try_from).collect()
    }

    #[instrument(skip(self), fields(coin = %coin_address))]
    async fn list_positions_by_coin(&self, coin_address: Address) -> Result<Vec<Position>> {
        let rows = sqlx::query_as::<_, PositionRow>(
            "SELECT * FROM positions WHERE coin_address = ? ORDER BY wallet_id ASC",
        )
        .bind(coin_address.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Position::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn list_positions_by_cluster(&self, cluster_id: i64) -> Result<Vec<Position>> {
        let rows = sqlx::query_as::<_, PositionRow>(
            "SELECT p.* FROM positions p \
             JOIN cluster_wallets cw ON cw.wallet_id = p.wallet_id \
             WHERE cw.cluster_id = ? ORDER BY cw.position ASC, p.coin_address ASC",
        )
        .bind(cluster_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Position::try_from).collect()
    }

    #[instrument(skip(self), fields(coin = %coin_address))]
    async fn get_position(&self, wallet_id: i64, coin_address: Address) -> Result<Option<Position>> {
        let row = sqlx::query_as::<_, PositionRow>(
            "SELECT * FROM positions WHERE wallet_id = ? AND coin_address = ?",
        )
        .bind(wallet_id)
        .bind(coin_address.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Position::try_from).transpose()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SWING CONFIG STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct SwingConfigRow {
    id: i64,
    fleet_name: String,
    coin_address: String,
    take_profit_bps: i64,
    stop_loss_bps: i64,
    trailing_stop_bps: Option<i64>,
    cooldown_sec: i64,
    slippage_bps: i64,
    enabled: i64,
    peak_pnl_bps: Option<i64>,
    last_action_at: Option<String>,
}

impl TryFrom<SwingConfigRow> for SwingConfig {
    type Error = StoreError;

    fn try_from(row: SwingConfigRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            fleet_name: row.fleet_name,
            coin_address: parse_address(&row.coin_address)?,
            take_profit_bps: row.take_profit_bps as u32,
            stop_loss_bps: row.stop_loss_bps as u32,
            trailing_stop_bps: row.trailing_stop_bps.map(|v| v as u32),
            cooldown_sec: row.cooldown_sec as u64,
            slippage_bps: row.slippage_bps as u32,
            enabled: row.enabled != 0,
            peak_pnl_bps: row.peak_pnl_bps,
            last_action_at: row.last_action_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

#[async_trait]
impl SwingConfigStore for SqliteStore {
    #[instrument(skip(self), fields(fleet = %fleet_name, coin = %coin_address))]
    async fn create_swing_config(
        &self,
        fleet_name: &str,
        coin_address: Address,
        take_profit_bps: u32,
        stop_loss_bps: u32,
        trailing_stop_bps: Option<u32>,
        cooldown_sec: u64,
        slippage_bps: u32,
    ) -> Result<SwingConfig> {
        let id = sqlx::query(
            "INSERT INTO swing_configs (fleet_name, coin_address, take_profit_bps, \
             stop_loss_bps, trailing_stop_bps, cooldown_sec, slippage_bps, enabled) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(fleet_name)
        .bind(coin_address.to_string())
        .bind(i64::from(take_profit_bps))
        .bind(i64::from(stop_loss_bps))
        .bind(trailing_stop_bps.map(i64::from))
        .bind(cooldown_sec as i64)
        .bind(i64::from(slippage_bps))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::AlreadyExists(
                format!("swing config for ({fleet_name:?}, {coin_address})"),
            ),
            other => StoreError::Database(other),
        })?
        .last_insert_rowid();

        let row = sqlx::query_as::<_, SwingConfigRow>("SELECT * FROM swing_configs WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        SwingConfig::try_from(row)
    }

    #[instrument(skip(self, update))]
    async fn update_swing_config(&self, id: i64, update: SwingConfigUpdate) -> Result<SwingConfig> {
        let row = sqlx::query_as::<_, SwingConfigRow>("SELECT * FROM swing_configs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("swing config {id}")))?;
        let mut current = SwingConfig::try_from(row)?;

        if let Some(v) = update.take_profit_bps {
            current.take_profit_bps = v;
        }
        if let Some(v) = update.stop_loss_bps {
            current.stop_loss_bps = v;
        }
        if let Some(v) = update.trailing_stop_bps {
            current.trailing_stop_bps = v;
        }
        if let Some(v) = update.cooldown_sec {
            current.cooldown_sec = v;
        }
        if let Some(v) = update.slippage_bps {
            current.slippage_bps = v;
        }
        if let Some(v) = update.enabled {
            current.enabled = v;
        }
        if let Some(v) = update.peak_pnl_bps {
            current.peak_pnl_bps = v;
        }
        if let Some(v) = update.last_action_at {
            current.last_action_at = Some(v);
        }

        sqlx::query(
            "UPDATE swing_configs SET take_profit_bps = ?, stop_loss_bps = ?, \
             trailing_stop_bps = ?, cooldown_sec = ?, slippage_bps = ?, enabled = ?, \
             peak_pnl_bps = ?, last_action_at = ? WHERE id = ?",
        )
        .bind(i64::from(current.take_profit_bps))
        .bind(i64::from(current.stop_loss_bps))
        .bind(current.trailing_stop_bps.map(i64::from))
        .bind(current.cooldown_sec as i64)
        .bind(i64::from(current.slippage_bps))
        .bind(i64::from(current.enabled))
        .bind(current.peak_pnl_bps)
        .bind(current.last_action_at.map(format_timestamp))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(current)
    }

    #[instrument(skip(self))]
    async fn delete_swing_config(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM swing_configs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_swing_configs(&self, enabled_only: bool) -> Result<Vec<SwingConfig>> {
        let rows = if enabled_only {
            sqlx::query_as::<_, SwingConfigRow>(
                "SELECT * FROM swing_configs WHERE enabled = 1 ORDER BY id ASC",
            )
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, SwingConfigRow>("SELECT * FROM swing_configs ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?
        };
        rows.into_iter().map(SwingConfig::try_from).collect()
    }

    #[instrument(skip(self), fields(fleet = %fleet_name, coin = %coin_address))]
    async fn get_swing_config(
        &self,
        fleet_name: &str,
        coin_address: Address,
    ) -> Result<Option<SwingConfig>> {
        let row = sqlx::query_as::<_, SwingConfigRow>(
            "SELECT * FROM swing_configs WHERE fleet_name = ? AND coin_address = ?",
        )
        .bind(fleet_name)
        .bind(coin_address.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(SwingConfig::try_from).transpose()
    }
}
