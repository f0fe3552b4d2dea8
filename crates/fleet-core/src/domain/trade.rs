//! The [`Trade`] entity: the record of one wallet's single swap.

use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wei;

/// Terminal status of a single trade unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    /// The swap's user operation was included and succeeded.
    Complete,
    /// The swap failed (send failure, receipt timeout, or revert).
    Failed,
}

/// The record of one wallet's single swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Store-assigned identifier.
    pub id: i64,
    /// The wallet that executed this swap.
    pub wallet_id: i64,
    /// Token spent (native address for buys, coin address for sells).
    pub from_token: Address,
    /// Token received (coin address for buys, native address for sells).
    pub to_token: Address,
    /// Amount of `from_token` spent, in wei.
    #[serde(with = "wei::serde_u256")]
    pub amount_in: U256,
    /// Amount of `to_token` received, in wei. `None` until the receipt is in.
    #[serde(with = "wei::serde_u256::option")]
    pub amount_out: Option<U256>,
    /// The ERC-4337 user operation hash.
    pub user_op_hash: Option<String>,
    /// The settled transaction hash, once included.
    pub tx_hash: Option<TxHash>,
    /// Terminal status.
    pub status: TradeStatus,
    /// A concise error summary, set when `status == Failed`.
    pub error_message: Option<String>,
    /// When this trade row was written.
    pub created_at: DateTime<Utc>,
}
