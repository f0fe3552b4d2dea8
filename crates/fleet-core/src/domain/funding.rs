//! The [`FundingRecord`] entity: a value transfer from the master wallet.

use alloy::primitives::{TxHash, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::TradeStatus;
use crate::wei;

/// The record of one value transfer from the master wallet to one fleet
/// wallet. Mirrors [`Trade`](super::Trade) but carries `amount_wei` instead
/// of a token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingRecord {
    /// Store-assigned identifier.
    pub id: i64,
    /// The fleet wallet that received the transfer.
    pub wallet_id: i64,
    /// Amount transferred, in wei.
    #[serde(with = "wei::serde_u256")]
    pub amount_wei: U256,
    /// The ERC-4337 user operation hash.
    pub user_op_hash: Option<String>,
    /// The settled transaction hash, once included.
    pub tx_hash: Option<TxHash>,
    /// Terminal status.
    pub status: TradeStatus,
    /// A concise error summary, set when `status == Failed`.
    pub error_message: Option<String>,
    /// When this funding row was written.
    pub created_at: DateTime<Utc>,
}
