//! Store port traits, one per aggregate.
//!
//! Every mutating call is serialized by [`crate::sqlite::SqliteStore`]'s
//! single-writer pool; readers may observe any committed state. No trait
//! here is a God trait over the whole schema — each maps to one of the
//! entities named in the data model.

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use fleet_core::domain::{
    Cluster, FundingRecord, Operation, OperationPayload, OperationStatus, OperationType, Position,
    StrategyMode, SwingConfig, Trade, TradeStatus, Wallet, WalletType,
};

use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════════
// WALLET STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for wallet persistence.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Create a wallet.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::AlreadyExists`] on a name or
    /// address collision.
    async fn create_wallet(
        &self,
        name: &str,
        address: Address,
        owner_address: Address,
        provider_account_name: &str,
        wallet_type: WalletType,
        is_master: bool,
    ) -> Result<Wallet>;

    /// The single master wallet, if one has been created.
    async fn get_master_wallet(&self) -> Result<Option<Wallet>>;

    /// Every wallet, in creation order.
    async fn list_wallets(&self) -> Result<Vec<Wallet>>;

    /// A wallet by its store-assigned id.
    async fn get_wallet_by_id(&self, id: i64) -> Result<Option<Wallet>>;

    /// A wallet by its unique name.
    async fn get_wallet_by_name(&self, name: &str) -> Result<Option<Wallet>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLUSTER STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for cluster ("fleet") persistence and membership.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Create a cluster.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::AlreadyExists`] on a name collision.
    async fn create_cluster(&self, name: &str, strategy_mode: StrategyMode) -> Result<Cluster>;

    /// A cluster by its unique name.
    async fn get_cluster_by_name(&self, name: &str) -> Result<Option<Cluster>>;

    /// A cluster by its store-assigned id.
    async fn get_cluster_by_id(&self, id: i64) -> Result<Option<Cluster>>;

    /// Every cluster, in creation order.
    async fn list_clusters(&self) -> Result<Vec<Cluster>>;

    /// Replace a cluster's membership wholly, preserving dispatch order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::NotFound`] if any wallet id is
    /// unknown, or a master wallet is included.
    async fn set_cluster_wallets(&self, cluster_id: i64, wallet_ids: &[i64]) -> Result<()>;

    /// The full wallet rows for a cluster's members, in dispatch order.
    async fn list_cluster_wallet_details(&self, cluster_id: i64) -> Result<Vec<Wallet>>;

    /// Delete a cluster. Member wallets are not deleted.
    async fn delete_cluster(&self, cluster_id: i64) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATION STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for the operation lifecycle: the durable intent state machine.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Persist a new operation in status `pending`.
    async fn create_operation(
        &self,
        operation_type: OperationType,
        cluster_id: i64,
        requested_by: &str,
        payload: OperationPayload,
    ) -> Result<Operation>;

    /// Transition an operation's status, enforcing the transition lattice.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::StateConflict`] on an out-of-order
    /// transition, [`crate::error::StoreError::NotFound`] if `id` is unknown.
    async fn update_operation_status(
        &self,
        id: i64,
        new_status: OperationStatus,
        error_message: Option<&str>,
    ) -> Result<Operation>;

    /// `pending -> approved`.
    async fn set_operation_approved(&self, id: i64, approved_by: &str) -> Result<Operation>;

    /// Cancel an operation still in `pending`: `pending -> cancelled`.
    async fn cancel_operation(&self, id: i64) -> Result<Operation>;

    /// A terminal transition carrying the operation's result.
    async fn set_operation_result(
        &self,
        id: i64,
        status: OperationStatus,
        result: serde_json::Value,
        error_message: Option<&str>,
    ) -> Result<Operation>;

    /// The most recently created operations, newest first.
    async fn list_operations(&self, limit: u32) -> Result<Vec<Operation>>;

    /// An operation by its store-assigned id.
    async fn get_operation_by_id(&self, id: i64) -> Result<Option<Operation>>;

    /// Seconds since the most recent terminal operation on `cluster_id`,
    /// excluding `exclude_operation_id` (the operation currently executing,
    /// so it does not count against its own cooldown window). `None` if no
    /// terminal operation exists yet.
    async fn get_latest_cluster_operation_age_sec(
        &self,
        cluster_id: i64,
        exclude_operation_id: Option<i64>,
    ) -> Result<Option<i64>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER STORE (trades + funding)
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for the append-only trade and funding ledgers.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Record one wallet's swap outcome.
    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<Trade>;

    /// Record one wallet's funding outcome.
    #[allow(clippy::too_many_arguments)]
    async fn create_funding(
        &self,
        wallet_id: i64,
        amount_wei: U256,
        user_op_hash: Option<&str>,
        tx_hash: Option<TxHash>,
        status: TradeStatus,
        error_message: Option<&str>,
    ) -> Result<FundingRecord>;

    /// Every trade, newest first.
    async fn list_trades(&self) -> Result<Vec<Trade>>;

    /// Every funding record, newest first.
    async fn list_funding(&self) -> Result<Vec<FundingRecord>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSITION STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for the per-(wallet, coin) cost-basis ledger.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Atomically apply a buy or sell delta to a position, creating the row
    /// on first touch. `holdings_raw` is clamped at zero on a sell that would
    /// otherwise underflow; the clamp is a diagnostic condition, not an error.
    async fn upsert_position(
        &self,
        wallet_id: i64,
        coin_address: Address,
        cost_delta: U256,
        received_delta: U256,
        holdings_delta: U256,
        is_buy: bool,
    ) -> Result<Position>;

    /// Every position held by one wallet.
    async fn list_positions_by_wallet(&self, wallet_id: i64) -> Result<Vec<Position>>;

    /// Every position in one coin, across wallets.
    async fn list_positions_by_coin(&self, coin_address: Address) -> Result<Vec<Position>>;

    /// Every position held by a cluster's member wallets.
    async fn list_positions_by_cluster(&self, cluster_id: i64) -> Result<Vec<Position>>;

    /// The position for one (wallet, coin) pair, if it has ever been touched.
    async fn get_position(&self, wallet_id: i64, coin_address: Address) -> Result<Option<Position>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SWING CONFIG STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// A partial update to a [`SwingConfig`]; unset fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct SwingConfigUpdate {
    /// New take-profit trigger, in basis points.
    pub take_profit_bps: Option<u32>,
    /// New stop-loss trigger, in basis points.
    pub stop_loss_bps: Option<u32>,
    /// New trailing-stop distance, in basis points (`Some(None)` clears it).
    pub trailing_stop_bps: Option<Option<u32>>,
    /// New cooldown, in seconds.
    pub cooldown_sec: Option<u64>,
    /// New slippage tolerance, in basis points.
    pub slippage_bps: Option<u32>,
    /// New enabled flag.
    pub enabled: Option<bool>,
    /// New running peak P&L (`Some(None)` clears it; set by the swing loop
    /// on reset).
    pub peak_pnl_bps: Option<Option<i64>>,
    /// New last-action timestamp.
    pub last_action_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Port for per-(fleet, coin) auto-exit rule persistence.
#[async_trait]
pub trait SwingConfigStore: Send + Sync {
    /// Create a swing config.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::AlreadyExists`] on a
    /// `(fleet_name, coin_address)` collision.
    #[allow(clippy::too_many_arguments)]
    async fn create_swing_config(
        &self,
        fleet_name: &str,
        coin_address: Address,
        take_profit_bps: u32,
        stop_loss_bps: u32,
        trailing_stop_bps: Option<u32>,
        cooldown_sec: u64,
        slippage_bps: u32,
    ) -> Result<SwingConfig>;

    /// Apply a partial update.
    async fn update_swing_config(&self, id: i64, update: SwingConfigUpdate) -> Result<SwingConfig>;

    /// Delete a swing config.
    async fn delete_swing_config(&self, id: i64) -> Result<()>;

    /// Every swing config, optionally restricted to enabled ones.
    async fn list_swing_configs(&self, enabled_only: bool) -> Result<Vec<SwingConfig>>;

    /// The swing config for one `(fleet_name, coin_address)` pair.
    async fn get_swing_config(
        &self,
        fleet_name: &str,
        coin_address: Address,
    ) -> Result<Option<SwingConfig>>;
}
