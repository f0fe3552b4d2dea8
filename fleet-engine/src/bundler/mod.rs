//! The bundler router: abstracts two [`BundlerAdapter`] providers behind a
//! uniform send/hedge/receipt-wait surface, with classifier-driven failover.

pub mod classifier;
pub mod fake;
pub mod http;

use std::sync::Arc;
use std::time::Duration;

use fleet_core::ports::{BundlerAdapter, ReceiptStatus, SendResult, UserOperation};
use fleet_core::{FleetError, Result};
use tracing::{instrument, warn};

use self::classifier::{classify, ErrorCategory};

/// One attempt in a [`BundlerRouter::send`] audit trail.
#[derive(Debug, Clone)]
pub struct SendAttempt {
    /// Which provider this attempt targeted.
    pub provider: String,
    /// Whether the attempt succeeded.
    pub ok: bool,
    /// The error message, if it failed.
    pub error: Option<String>,
}

/// The outcome of [`BundlerRouter::send`]: the winning result plus every
/// attempt made to get there.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// The accepted send.
    pub result: SendResult,
    /// Every attempt, in order, including the winning one.
    pub attempts: Vec<SendAttempt>,
}

/// Tuning for [`BundlerRouter`], mirroring `fleet_engine::config::BundlerSettings`.
#[derive(Debug, Clone, Copy)]
pub struct BundlerTiming {
    /// Bounds every individual send attempt.
    pub send_timeout: Duration,
    /// Delay before [`BundlerRouter::send_hedged`] races the secondary.
    pub hedge_delay: Duration,
    /// Interval between receipt polls.
    pub receipt_poll_interval: Duration,
    /// Overall bound on [`BundlerRouter::wait_for_receipt`].
    pub receipt_timeout: Duration,
}

/// Routes user operations to a primary bundler, failing over to a secondary
/// when the classifier says the failure is retryable.
#[derive(Debug, Clone)]
pub struct BundlerRouter {
    primary: Arc<dyn BundlerAdapter>,
    secondary: Option<Arc<dyn BundlerAdapter>>,
    timing: BundlerTiming,
}

impl BundlerRouter {
    /// Build a router over a primary provider and an optional secondary.
    #[must_use]
    pub const fn new(
        primary: Arc<dyn BundlerAdapter>,
        secondary: Option<Arc<dyn BundlerAdapter>>,
        timing: BundlerTiming,
    ) -> Self {
        Self {
            primary,
            secondary,
            timing,
        }
    }

    /// Send via the primary, bounded by `send_timeout`; on a failover-eligible
    /// error with a secondary configured, retry there. Returns the accepted
    /// result plus the full per-attempt audit trail.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::BundlerSendFail`] if every eligible provider fails.
    #[instrument(skip(self, user_op))]
    pub async fn send(&self, user_op: &UserOperation) -> Result<SendOutcome> {
        let mut attempts = Vec::new();

        match self.try_send(&self.primary, user_op).await {
            Ok(result) => {
                attempts.push(SendAttempt {
                    provider: result.provider.clone(),
                    ok: true,
                    error: None,
                });
                return Ok(SendOutcome { result, attempts });
            }
            Err(error) => {
                let category = classify(&error.to_string());
                attempts.push(SendAttempt {
                    provider: self.primary.name().to_string(),
                    ok: false,
                    error: Some(error.to_string()),
                });
                if !category.is_failover() {
                    return Err(error);
                }
                warn!(category = ?category, "primary bundler send failed, attempting failover");
            }
        }

        let Some(secondary) = &self.secondary else {
            return Err(FleetError::BundlerSendFail(
                "primary failed and no secondary is configured".into(),
            ));
        };

        match self.try_send(secondary, user_op).await {
            Ok(result) => {
                attempts.push(SendAttempt {
                    provider: result.provider.clone(),
                    ok: true,
                    error: None,
                });
                Ok(SendOutcome { result, attempts })
            }
            Err(error) => {
                attempts.push(SendAttempt {
                    provider: secondary.name().to_string(),
                    ok: false,
                    error: Some(error.to_string()),
                });
                Err(FleetError::BundlerSendFail(format!(
                    "both providers failed: {attempts:?}"
                )))
            }
        }
    }

    /// Send via both providers concurrently: the primary immediately, the
    /// secondary after `hedge_delay`. The first non-erroneous result wins.
    /// Used only when the caller opts in (not the default send path).
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::BundlerSendFail`] if both providers fail, or if
    /// no secondary is configured.
    #[instrument(skip(self, user_op))]
    pub async fn send_hedged(&self, user_op: &UserOperation) -> Result<SendOutcome> {
        let Some(secondary) = self.secondary.clone() else {
            return self.send(user_op).await;
        };

        let primary_fut = self.try_send(&self.primary, user_op);
        let secondary_fut = async {
            tokio::time::sleep(self.timing.hedge_delay).await;
            self.try_send(&secondary, user_op).await
        };

        let primary_name = self.primary.name().to_string();
        let secondary_name = secondary.name().to_string();
        tokio::select! {
            result = primary_fut => hedge_outcome(result, &primary_name),
            result = secondary_fut => hedge_outcome(result, &secondary_name),
        }
    }

    /// Poll both configured providers at `receipt_poll_interval`, returning
    /// the first `included` receipt; times out after `receipt_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::ReceiptTimeout`] if neither provider reports
    /// inclusion before the bound.
    #[instrument(skip(self))]
    pub async fn wait_for_receipt(&self, user_op_hash: &str) -> Result<ReceiptStatus> {
        let deadline = tokio::time::Instant::now() + self.timing.receipt_timeout;
        loop {
            if let Some(status) = self.poll_once(user_op_hash).await {
                return Ok(status);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(FleetError::ReceiptTimeout(format!(
                    "no receipt for {user_op_hash} within {:?}",
                    self.timing.receipt_timeout
                )));
            }
            tokio::time::sleep(self.timing.receipt_poll_interval).await;
        }
    }

    async fn poll_once(&self, user_op_hash: &str) -> Option<ReceiptStatus> {
        if let Ok(status) = self.primary.get_receipt(user_op_hash).await {
            if status.included {
                return Some(status);
            }
        }
        if let Some(secondary) = &self.secondary {
            if let Ok(status) = secondary.get_receipt(user_op_hash).await {
                if status.included {
                    return Some(status);
                }
            }
        }
        None
    }

    async fn try_send(&self, provider: &Arc<dyn BundlerAdapter>, user_op: &UserOperation) -> Result<SendResult> {
        match tokio::time::timeout(self.timing.send_timeout, provider.send_user_operation(user_op)).await {
            Ok(result) => result,
            Err(_) => Err(FleetError::BundlerSendFail(format!(
                "{} send timed out after {:?}",
                provider.name(),
                self.timing.send_timeout
            ))),
        }
    }
}

fn hedge_outcome(result: Result<SendResult>, provider_name: &str) -> Result<SendOutcome> {
    let attempt_provider = provider_name.to_string();
    match result {
        Ok(result) => Ok(SendOutcome {
            attempts: vec![SendAttempt {
                provider: result.provider.clone(),
                ok: true,
                error: None,
            }],
            result,
        }),
        Err(error) => Err(FleetError::BundlerSendFail(format!(
            "hedged send on {attempt_provider} failed: {error}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{FakeBundler, ScriptedReceipt, ScriptedSend};
    use super::*;
    use alloy::primitives::{Address, Bytes, U256};

    fn timing() -> BundlerTiming {
        BundlerTiming {
            send_timeout: Duration::from_millis(200),
            hedge_delay: Duration::from_millis(10),
            receipt_poll_interval: Duration::from_millis(5),
            receipt_timeout: Duration::from_millis(100),
        }
    }

    fn user_op() -> UserOperation {
        UserOperation {
            sender: Address::ZERO,
            nonce: U256::ZERO,
            call_data: Bytes::new(),
            paymaster_context: None,
        }
    }

    #[tokio::test]
    async fn send_succeeds_on_primary_without_touching_secondary() {
        let primary = Arc::new(FakeBundler::new("primary").with_send(ScriptedSend::Ok("0xabc".into())));
        let router = BundlerRouter::new(primary, None, timing());

        let outcome = router.send(&user_op()).await.expect("send succeeds");
        assert_eq!(outcome.result.provider, "primary");
        assert_eq!(outcome.attempts.len(), 1);
        assert!(outcome.attempts[0].ok);
    }

    #[tokio::test]
    async fn rate_limited_primary_fails_over_to_secondary() {
        let primary = Arc::new(FakeBundler::new("primary").with_send(ScriptedSend::Err("429 rate limit".into())));
        let secondary = Arc::new(FakeBundler::new("secondary").with_send(ScriptedSend::Ok("0xdef".into())));
        let router = BundlerRouter::new(primary, Some(secondary), timing());

        let outcome = router.send(&user_op()).await.expect("failover succeeds");
        assert_eq!(outcome.result.provider, "secondary");
        assert_eq!(outcome.attempts.len(), 2);
        assert!(!outcome.attempts[0].ok);
        assert!(outcome.attempts[1].ok);
    }

    #[tokio::test]
    async fn underpriced_error_never_fails_over() {
        let primary =
            Arc::new(FakeBundler::new("primary").with_send(ScriptedSend::Err("max fee too low".into())));
        let secondary = Arc::new(FakeBundler::new("secondary"));
        let router = BundlerRouter::new(primary, Some(secondary), timing());

        let error = router.send(&user_op()).await.unwrap_err();
        assert!(matches!(error, FleetError::BundlerSendFail(_)));
    }

    #[tokio::test]
    async fn send_fails_when_both_providers_fail() {
        let primary = Arc::new(FakeBundler::new("primary").with_send(ScriptedSend::Err("timeout".into())));
        let secondary =
            Arc::new(FakeBundler::new("secondary").with_send(ScriptedSend::Err("timed out".into())));
        let router = BundlerRouter::new(primary, Some(secondary), timing());

        assert!(router.send(&user_op()).await.is_err());
    }

    #[tokio::test]
    async fn wait_for_receipt_returns_first_inclusion() {
        let primary = Arc::new(
            FakeBundler::new("primary")
                .with_receipt(ScriptedReceipt::Pending)
                .with_receipt(ScriptedReceipt::Included {
                    tx_hash: "0x111".into(),
                    success: true,
                    reason: None,
                }),
        );
        let router = BundlerRouter::new(primary, None, timing());

        let receipt = router.wait_for_receipt("0xhash").await.expect("receipt arrives");
        assert!(receipt.included);
        assert_eq!(receipt.tx_hash.as_deref(), Some("0x111"));
    }

    #[tokio::test]
    async fn wait_for_receipt_times_out() {
        let mut primary = FakeBundler::new("primary");
        for _ in 0..50 {
            primary = primary.with_receipt(ScriptedReceipt::Pending);
        }
        let router = BundlerRouter::new(Arc::new(primary), None, timing());
        let error = router.wait_for_receipt("0xhash").await.unwrap_err();
        assert!(matches!(error, FleetError::ReceiptTimeout(_)));
    }
}
