//! A boundary-stub [`AccountProvider`].
//!
//! Key management and signing are external collaborators this crate hides
//! behind the trait (see `fleet_core::ports::account_provider`); this
//! implementation is a production placeholder wired into the boot path (a
//! stand-in chain provider, not a test double) — it tracks a nonce per named
//! account in memory and routes every call batch through the real
//! [`BundlerRouter`], but signs nothing.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use fleet_core::ports::{AccountSession, Call, ReceiptOutcome, UserOpHandle};
use fleet_core::Result;
use tokio::sync::Mutex;

use crate::bundler::BundlerRouter;

/// Resolves an account name to the smart-account address that sends its
/// user operations. A real provider would derive this from a signer; here
/// it's whatever the caller registered up front.
#[derive(Debug)]
pub struct StubAccountProvider {
    bundler: Arc<BundlerRouter>,
    addresses: HashMap<String, Address>,
    nonces: Arc<Mutex<HashMap<String, U256>>>,
    balances: Arc<Mutex<HashMap<String, U256>>>,
}

impl StubAccountProvider {
    /// Build a provider routing through `bundler`, with no accounts registered.
    #[must_use]
    pub fn new(bundler: Arc<BundlerRouter>) -> Self {
        Self {
            bundler,
            addresses: HashMap::new(),
            nonces: Arc::new(Mutex::new(HashMap::new())),
            balances: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a named account's sending address.
    #[must_use]
    pub fn with_account(mut self, name: impl Into<String>, address: Address) -> Self {
        self.addresses.insert(name.into(), address);
        self
    }

    /// Seed a named account's starting native balance. A real provider would
    /// read this from the chain; this stub tracks it in memory so tests and
    /// the funding floor filter have something to observe.
    #[must_use]
    pub async fn set_native_balance(&self, name: impl Into<String>, balance: U256) {
        self.balances.lock().await.insert(name.into(), balance);
    }
}

#[async_trait]
impl fleet_core::ports::AccountProvider for StubAccountProvider {
    async fn get_session(&self, name: &str) -> Result<Box<dyn AccountSession>> {
        let sender = *self
            .addresses
            .get(name)
            .unwrap_or(&Address::ZERO);
        let bundler = Arc::clone(&self.bundler);
        Ok(Box::new(RoutedAccountSession {
            name: name.to_string(),
            sender,
            bundler,
            nonces: Arc::clone(&self.nonces),
            balances: Arc::clone(&self.balances),
        }))
    }
}

struct RoutedAccountSession {
    name: String,
    sender: Address,
    bundler: Arc<BundlerRouter>,
    nonces: Arc<Mutex<HashMap<String, U256>>>,
    balances: Arc<Mutex<HashMap<String, U256>>>,
}

#[async_trait]
impl AccountSession for RoutedAccountSession {
    async fn send_user_op(&self, calls: Vec<Call>) -> Result<UserOpHandle> {
        let nonce = {
            let mut nonces = self.nonces.lock().await;
            let entry = nonces.entry(self.name.clone()).or_insert(U256::ZERO);
            let current = *entry;
            *entry += U256::from(1u64);
            current
        };

        let call_data = encode_call_batch(&calls);
        let user_op = fleet_core::ports::UserOperation {
            sender: self.sender,
            nonce,
            call_data,
            paymaster_context: None,
        };

        let outcome = self.bundler.send(&user_op).await?;
        Ok(UserOpHandle {
            user_op_hash: outcome.result.user_op_hash,
            provider: outcome.result.provider,
        })
    }

    async fn wait_receipt(&self, user_op_hash: &str) -> Result<ReceiptOutcome> {
        let status = self.bundler.wait_for_receipt(user_op_hash).await?;
        Ok(ReceiptOutcome {
            included: status.included,
            tx_hash: status.tx_hash.and_then(|h| h.parse().ok()),
            success: status.success,
            reason: status.reason,
        })
    }

    async fn native_balance(&self) -> Result<U256> {
        Ok(self.balances.lock().await.get(&self.name).copied().unwrap_or(U256::ZERO))
    }
}

/// Concatenates each call's raw calldata; a real smart account would ABI-encode
/// an `executeBatch(Call[])`, which needs the account's specific ABI (out of
/// scope here).
fn encode_call_batch(calls: &[Call]) -> alloy::primitives::Bytes {
    let mut bytes = Vec::new();
    for call in calls {
        bytes.extend_from_slice(&call.data);
    }
    bytes.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::fake::{FakeBundler, ScriptedSend};
    use crate::bundler::BundlerTiming;
    use std::time::Duration;

    fn timing() -> BundlerTiming {
        BundlerTiming {
            send_timeout: Duration::from_millis(200),
            hedge_delay: Duration::from_millis(10),
            receipt_poll_interval: Duration::from_millis(5),
            receipt_timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn nonces_increment_per_account() {
        let primary = Arc::new(FakeBundler::new("primary").with_send(ScriptedSend::Ok("0x1".into())));
        let router = Arc::new(BundlerRouter::new(primary, None, timing()));
        let provider = StubAccountProvider::new(router).with_account("wallet-1", Address::ZERO);

        let session = provider.get_session("wallet-1").await.expect("session");
        session.send_user_op(vec![]).await.expect("first send");
        session.send_user_op(vec![]).await.expect("second send");

        let nonces = provider.nonces.lock().await;
        assert_eq!(nonces.get("wallet-1"), Some(&U256::from(2u64)));
    }
}
