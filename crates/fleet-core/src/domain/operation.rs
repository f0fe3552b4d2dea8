//! The [`Operation`] entity: the unit of durable intent.
//!
//! The payload is a tagged variant (`OperationPayload`) with one case per
//! [`OperationType`], not an opaque [`serde_json::Value`]. The store still
//! round-trips it through JSON text in the `operations.payload_json`
//! column, but every producer and consumer deals in the typed enum; nothing
//! trusts the payload without first deserializing it against this schema.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::StrategyMode;
use crate::wei;

/// The kind of intent an [`Operation`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    /// Fund each of a cluster's wallets by an absolute amount.
    FundingRequest,
    /// Buy a coin across a cluster's wallets.
    SupportCoin,
    /// Sell a coin across a cluster's wallets.
    ExitCoin,
}

/// The operation status lattice.
///
/// Transitions are monotone and write-once per target:
/// `pending -> {approved, cancelled}`, `approved -> {executing, failed}`,
/// `executing -> {complete, partial, failed}`. The `approved -> failed` arm
/// is the execution engine's boundary re-check (`assertExecutionAllowed`):
/// a policy rejection caught before step 1 (the `approved -> executing`
/// move) still needs a terminal home, without pretending execution began.
/// Reverse transitions are forbidden; see
/// `fleet_store::ports::OperationStore::update_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Persisted, awaiting approval.
    Pending,
    /// Approved, awaiting execution.
    Approved,
    /// Execution in flight.
    Executing,
    /// Every unit succeeded.
    Complete,
    /// Some units succeeded, some failed.
    Partial,
    /// Every unit failed, or execution was refused before any unit ran.
    Failed,
    /// Cancelled while still pending.
    Cancelled,
}

impl OperationStatus {
    /// Whether `self -> next` is an allowed transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Cancelled)
                | (Self::Approved, Self::Executing)
                | (Self::Approved, Self::Failed)
                | (Self::Executing, Self::Complete)
                | (Self::Executing, Self::Partial)
                | (Self::Executing, Self::Failed)
        )
    }

    /// Whether this status is terminal (no further transitions are possible).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Complete | Self::Partial | Self::Failed | Self::Cancelled
        )
    }
}

/// The typed, tagged intent payload carried by an [`Operation`].
///
/// Numeric fields round-trip as decimal strings on the wire
/// (see [`crate::wei`]) and as native `U256` once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OperationPayload {
    /// Fund each wallet in `cluster_id` by the absolute amount `amount_wei`.
    #[serde(rename = "FUNDING_REQUEST")]
    FundingRequest {
        /// Target cluster.
        cluster_id: i64,
        /// Per-wallet absolute funding amount, in wei.
        #[serde(with = "wei::serde_u256")]
        amount_wei: U256,
    },
    /// Buy `coin_address` across `cluster_id`'s wallets for a total of
    /// `total_amount_wei`, split per `strategy_mode`.
    #[serde(rename = "SUPPORT_COIN")]
    SupportCoin {
        /// Target cluster.
        cluster_id: i64,
        /// Coin to buy.
        coin_address: Address,
        /// Total amount to spend, in wei, split across the cluster.
        #[serde(with = "wei::serde_u256")]
        total_amount_wei: U256,
        /// Maximum acceptable slippage, in basis points.
        slippage_bps: u32,
        /// How the total is split across wallets.
        strategy_mode: StrategyMode,
    },
    /// Sell `coin_address` across `cluster_id`'s wallets for a total of
    /// `total_amount_wei` worth of holdings, split per `strategy_mode`.
    #[serde(rename = "EXIT_COIN")]
    ExitCoin {
        /// Target cluster.
        cluster_id: i64,
        /// Coin to sell.
        coin_address: Address,
        /// Total amount (in the coin's native buy-side unit, wei-denominated)
        /// to sell, split across the cluster.
        #[serde(with = "wei::serde_u256")]
        total_amount_wei: U256,
        /// Maximum acceptable slippage, in basis points.
        slippage_bps: u32,
        /// How the total is split across wallets.
        strategy_mode: StrategyMode,
    },
}

impl OperationPayload {
    /// The [`OperationType`] tag matching this payload's variant.
    #[must_use]
    pub const fn operation_type(&self) -> OperationType {
        match self {
            Self::FundingRequest { .. } => OperationType::FundingRequest,
            Self::SupportCoin { .. } => OperationType::SupportCoin,
            Self::ExitCoin { .. } => OperationType::ExitCoin,
        }
    }

    /// The target cluster id, common to every variant.
    #[must_use]
    pub const fn cluster_id(&self) -> i64 {
        match self {
            Self::FundingRequest { cluster_id, .. }
            | Self::SupportCoin { cluster_id, .. }
            | Self::ExitCoin { cluster_id, .. } => *cluster_id,
        }
    }
}

/// The unit of durable intent: the atomic target of policy and approval.
///
/// # Invariants
///
/// See [`OperationStatus::can_transition_to`] for the status lattice; the
/// store refuses any update that does not respect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Store-assigned identifier.
    pub id: i64,
    /// The operation's type tag (redundant with `payload`'s variant, kept as
    /// its own indexed column for cheap filtering).
    pub operation_type: OperationType,
    /// The cluster this operation targets.
    pub cluster_id: i64,
    /// Current lattice position.
    pub status: OperationStatus,
    /// Free-form identifier of who requested this operation
    /// (e.g. `"autonomy-worker"`, an HTTP caller's user id).
    pub requested_by: String,
    /// Free-form identifier of who approved this operation, once approved.
    pub approved_by: Option<String>,
    /// The typed intent.
    pub payload: OperationPayload,
    /// Terminal result, set by `setOperationResult`.
    pub result: Option<serde_json::Value>,
    /// A concise human-readable error summary, set on `failed`/`partial`.
    pub error_message: Option<String>,
    /// When this operation was first persisted.
    pub created_at: DateTime<Utc>,
    /// When this operation was last mutated.
    pub updated_at: DateTime<Utc>,
}
