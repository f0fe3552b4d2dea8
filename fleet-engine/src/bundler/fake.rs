//! A scripted [`BundlerAdapter`] test double.
//!
//! Tests queue up canned `send_user_operation` / `get_receipt` outcomes in
//! advance (success, a specific error message, or a plain "not yet
//! included"), then assert on [`super::BundlerRouter`]'s behavior against
//! them. Unscripted calls panic — an unscripted call in a test means the
//! test forgot to arrange for it, not a code path worth tolerating silently.

#![allow(clippy::expect_used, clippy::panic)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use fleet_core::ports::{BundlerAdapter, GasEstimate, ReceiptStatus, SendResult, UserOperation};
use fleet_core::Result;

/// One scripted outcome for a [`FakeBundler::send_user_operation`] call.
#[derive(Debug, Clone)]
pub enum ScriptedSend {
    /// The send succeeds with this hash.
    Ok(String),
    /// The send fails with this error message (fed to the classifier).
    Err(String),
}

/// One scripted outcome for a [`FakeBundler::get_receipt`] call.
#[derive(Debug, Clone)]
pub enum ScriptedReceipt {
    /// Included, with this success flag and optional revert reason.
    Included { tx_hash: String, success: bool, reason: Option<String> },
    /// Not yet included.
    Pending,
    /// The poll itself errors.
    Err(String),
}

/// A [`BundlerAdapter`] whose responses are scripted in advance by a test.
#[derive(Debug)]
pub struct FakeBundler {
    name: String,
    sends: Mutex<VecDeque<ScriptedSend>>,
    receipts: Mutex<VecDeque<ScriptedReceipt>>,
}

impl FakeBundler {
    /// A fake provider named `name`, with no scripted responses yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sends: Mutex::new(VecDeque::new()),
            receipts: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue the next `send_user_operation` outcome.
    #[must_use]
    pub fn with_send(self, outcome: ScriptedSend) -> Self {
        self.sends.lock().expect("lock poisoned").push_back(outcome);
        self
    }

    /// Queue the next `get_receipt` outcome.
    #[must_use]
    pub fn with_receipt(self, outcome: ScriptedReceipt) -> Self {
        self.receipts.lock().expect("lock poisoned").push_back(outcome);
        self
    }
}

#[async_trait]
impl BundlerAdapter for FakeBundler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn estimate_gas(&self, _user_op: &UserOperation) -> Result<GasEstimate> {
        Ok(GasEstimate {
            pre_verification: 21_000,
            verification: 100_000,
            call: 200_000,
        })
    }

    async fn send_user_operation(&self, _user_op: &UserOperation) -> Result<SendResult> {
        let next = self
            .sends
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_else(|| panic!("FakeBundler {:?}: no scripted send queued", self.name));
        match next {
            ScriptedSend::Ok(hash) => Ok(SendResult {
                user_op_hash: hash,
                provider: self.name.clone(),
            }),
            ScriptedSend::Err(message) => Err(fleet_core::FleetError::BundlerSendFail(message)),
        }
    }

    async fn get_receipt(&self, _user_op_hash: &str) -> Result<ReceiptStatus> {
        let next = self
            .receipts
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_else(|| panic!("FakeBundler {:?}: no scripted receipt queued", self.name));
        match next {
            ScriptedReceipt::Included { tx_hash, success, reason } => Ok(ReceiptStatus {
                included: true,
                tx_hash: Some(tx_hash),
                success: Some(success),
                reason,
            }),
            ScriptedReceipt::Pending => Ok(ReceiptStatus {
                included: false,
                tx_hash: None,
                success: None,
                reason: None,
            }),
            ScriptedReceipt::Err(message) => Err(fleet_core::FleetError::ReceiptTimeout(message)),
        }
    }
}
