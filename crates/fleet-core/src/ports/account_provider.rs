//! The [`AccountProvider`] capability: named smart accounts and bundler
//! sessions, hiding key management and signing from the execution engine.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;

use crate::error::Result;

/// One call within a user operation's batch (to a DEX router, a paymaster,
/// or a plain value transfer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Call target.
    pub to: Address,
    /// Calldata.
    pub data: Bytes,
    /// Native value attached to the call, in wei.
    pub value: U256,
}

impl Call {
    /// A plain native-value transfer with no calldata.
    #[must_use]
    pub fn value_transfer(to: Address, value: U256) -> Self {
        Self {
            to,
            data: Bytes::new(),
            value,
        }
    }
}

/// The outcome of sending a user operation: an opaque handle the caller
/// later hands to [`AccountSession::wait_receipt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOpHandle {
    /// The ERC-4337 user operation hash.
    pub user_op_hash: String,
    /// Which bundler provider accepted the send (for the audit trail).
    pub provider: String,
}

/// The terminal outcome of waiting for a user operation's receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptOutcome {
    /// Whether a receipt was observed before the wait timed out.
    pub included: bool,
    /// The settled transaction hash, once included.
    pub tx_hash: Option<TxHash>,
    /// Whether the user operation's execution succeeded, once included.
    pub success: Option<bool>,
    /// A human-readable revert/failure reason, when `success == Some(false)`.
    pub reason: Option<String>,
}

/// A live session for one named account: send a batch of calls as a
/// sponsored user operation, and await its receipt. Implementations route
/// `send_user_op` through the bundler router internally.
#[async_trait]
pub trait AccountSession: Send + Sync {
    /// Assemble, sign, and send `calls` as a single user operation.
    async fn send_user_op(&self, calls: Vec<Call>) -> Result<UserOpHandle>;

    /// Poll for a receipt for a previously sent user operation.
    async fn wait_receipt(&self, user_op_hash: &str) -> Result<ReceiptOutcome>;

    /// The account's current native balance, in wei. Used by `FUNDING_REQUEST`
    /// dispatch to skip wallets already above the configured floor.
    async fn native_balance(&self) -> Result<U256>;
}

/// Yields [`AccountSession`]s for named smart accounts.
///
/// `name` is a wallet's `provider_account_name` handle (see
/// [`crate::domain::Wallet`]); the provider resolves it to a signer and
/// smart-account address known only to this capability.
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Obtain a session for the named account.
    async fn get_session(&self, name: &str) -> Result<Box<dyn AccountSession>>;
}

#[async_trait]
impl<T: AccountProvider + ?Sized> AccountProvider for std::sync::Arc<T> {
    async fn get_session(&self, name: &str) -> Result<Box<dyn AccountSession>> {
        (**self).get_session(name).await
    }
}
