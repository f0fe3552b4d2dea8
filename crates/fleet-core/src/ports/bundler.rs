//! The [`BundlerAdapter`] capability: one concrete bundler provider's
//! submit/estimate/receipt surface. The router in `fleet_engine::bundler`
//! holds two of these and adds failover, hedging, and receipt polling on
//! top; this trait itself knows nothing about any of that.

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;

use crate::error::Result;

/// An ERC-4337-style user operation request. Opaque beyond "submit and
/// await a receipt" to everything above the bundler layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOperation {
    /// The smart account sending this operation.
    pub sender: Address,
    /// The account's current nonce.
    pub nonce: U256,
    /// ABI-encoded call batch (the smart account's `execute`/`executeBatch` calldata).
    pub call_data: Bytes,
    /// Optional paymaster context; when set, the paymaster sponsors gas and
    /// the sending account holds no native balance for gas.
    pub paymaster_context: Option<Bytes>,
}

/// Gas estimate for a user operation, broken out per ERC-4337 phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasEstimate {
    /// Gas charged before verification begins.
    pub pre_verification: u64,
    /// Gas for the account's `validateUserOp`.
    pub verification: u64,
    /// Gas for the batched call execution itself.
    pub call: u64,
}

/// The result of a successful send: an opaque hash plus which provider
/// accepted it, for the router's audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    /// The user operation hash.
    pub user_op_hash: String,
    /// The name of the provider that accepted the send.
    pub provider: String,
}

/// The terminal state of a receipt poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptStatus {
    /// Whether the user operation was included in a block.
    pub included: bool,
    /// The settled transaction hash, once included.
    pub tx_hash: Option<String>,
    /// Whether execution succeeded, once included.
    pub success: Option<bool>,
    /// A human-readable revert/failure reason, when `success == Some(false)`.
    pub reason: Option<String>,
}

/// One concrete bundler provider's submit/estimate/receipt surface.
#[async_trait]
pub trait BundlerAdapter: Send + Sync {
    /// This provider's name, used in audit trails and the classifier.
    fn name(&self) -> &str;

    /// Estimate gas for a user operation before sending it.
    async fn estimate_gas(&self, user_op: &UserOperation) -> Result<GasEstimate>;

    /// Submit a user operation for inclusion.
    async fn send_user_operation(&self, user_op: &UserOperation) -> Result<SendResult>;

    /// Poll for a receipt for a previously sent user operation.
    async fn get_receipt(&self, user_op_hash: &str) -> Result<ReceiptStatus>;
}

#[async_trait]
impl<T: BundlerAdapter + ?Sized> BundlerAdapter for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn estimate_gas(&self, user_op: &UserOperation) -> Result<GasEstimate> {
        (**self).estimate_gas(user_op).await
    }

    async fn send_user_operation(&self, user_op: &UserOperation) -> Result<SendResult> {
        (**self).send_user_operation(user_op).await
    }

    async fn get_receipt(&self, user_op_hash: &str) -> Result<ReceiptStatus> {
        (**self).get_receipt(user_op_hash).await
    }
}
