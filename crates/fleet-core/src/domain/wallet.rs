//! The [`Wallet`] entity: a smart-contract account managed by this process.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of account a [`Wallet`] represents.
///
/// Currently only smart-contract accounts are supported; the enum exists so
/// the store's `wallet_type` column and wire payloads have a stable tag even
/// though only one variant is populated today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    /// An ERC-4337 smart-contract account.
    Smart,
}

/// Identity of a smart-contract account managed by this process.
///
/// # Invariants
///
/// - Exactly one wallet in the store has `is_master == true`.
/// - `address` and `name` are globally unique.
/// - A wallet's derived address at boot must match `address`; a mismatch is
///   a fatal [`KEY_MISMATCH`](crate::error::FleetError::KeyMismatch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Store-assigned identifier.
    pub id: i64,
    /// Unique, human-assigned name (e.g. `"alpha-03"`).
    pub name: String,
    /// The wallet's on-chain smart-account address.
    pub address: Address,
    /// The address of the owner/signer backing the smart account.
    pub owner_address: Address,
    /// Handle consumed by `AccountProvider::get_session` to obtain a signer.
    pub provider_account_name: String,
    /// The account kind.
    pub wallet_type: WalletType,
    /// Whether this is the single master/funding wallet.
    pub is_master: bool,
    /// When this wallet was first persisted.
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// True when this wallet is a fleet wallet eligible for cluster membership.
    ///
    /// Master wallets fund clusters; they are never themselves cluster
    /// members (see [`Cluster`](super::Cluster)'s membership invariant).
    #[must_use]
    pub const fn is_fleet_member_eligible(&self) -> bool {
        !self.is_master
    }
}
