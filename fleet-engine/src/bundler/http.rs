//! An ERC-4337 bundler [`BundlerAdapter`] backed by a JSON-RPC endpoint.
//!
//! Speaks the standard `eth_sendUserOperation` / `eth_estimateUserOperationGas`
//! / `eth_getUserOperationReceipt` surface over HTTP, the concrete wiring
//! [`crate::service`] plugs into the router's primary/secondary slots.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use fleet_core::ports::{BundlerAdapter, GasEstimate, ReceiptStatus, SendResult, UserOperation};
use fleet_core::{FleetError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawUserOpReceipt {
    #[serde(rename = "userOpHash")]
    #[allow(dead_code)]
    user_op_hash: Option<String>,
    success: Option<bool>,
    reason: Option<String>,
    receipt: Option<RawTxReceipt>,
}

#[derive(Debug, Deserialize)]
struct RawTxReceipt {
    #[serde(rename = "transactionHash")]
    transaction_hash: Option<String>,
}

/// An ERC-4337 bundler provider reached over HTTP JSON-RPC.
#[derive(Debug)]
pub struct HttpBundlerAdapter {
    client: reqwest::Client,
    url: String,
    name: String,
    next_id: AtomicU64,
}

impl HttpBundlerAdapter {
    /// Build an adapter targeting `url`, identified in audit trails as `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            name: name.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: for<'de> Deserialize<'de>>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| FleetError::BundlerSendFail(format!("{method} request to {}: {e}", self.url)))?;

        let body: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| FleetError::BundlerSendFail(format!("{method} response decode: {e}")))?;

        if let Some(error) = body.error {
            return Err(FleetError::BundlerSendFail(format!("{method}: {}", error.message)));
        }
        body.result
            .ok_or_else(|| FleetError::BundlerSendFail(format!("{method}: empty result")))
    }
}

fn encode_user_op(user_op: &UserOperation) -> Value {
    json!({
        "sender": user_op.sender,
        "nonce": format!("0x{:x}", user_op.nonce),
        "callData": user_op.call_data,
        "paymasterContext": user_op.paymaster_context,
    })
}

#[async_trait]
impl BundlerAdapter for HttpBundlerAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, user_op), fields(provider = %self.name))]
    async fn estimate_gas(&self, user_op: &UserOperation) -> Result<GasEstimate> {
        #[derive(Deserialize)]
        struct RawEstimate {
            #[serde(rename = "preVerificationGas")]
            pre_verification_gas: String,
            #[serde(rename = "verificationGasLimit")]
            verification_gas_limit: String,
            #[serde(rename = "callGasLimit")]
            call_gas_limit: String,
        }

        let raw: RawEstimate = self
            .call("eth_estimateUserOperationGas", json!([encode_user_op(user_op)]))
            .await?;

        Ok(GasEstimate {
            pre_verification: parse_hex_u64(&raw.pre_verification_gas),
            verification: parse_hex_u64(&raw.verification_gas_limit),
            call: parse_hex_u64(&raw.call_gas_limit),
        })
    }

    #[instrument(skip(self, user_op), fields(provider = %self.name))]
    async fn send_user_operation(&self, user_op: &UserOperation) -> Result<SendResult> {
        let hash: String = self
            .call("eth_sendUserOperation", json!([encode_user_op(user_op)]))
            .await?;
        Ok(SendResult {
            user_op_hash: hash,
            provider: self.name.clone(),
        })
    }

    #[instrument(skip(self), fields(provider = %self.name))]
    async fn get_receipt(&self, user_op_hash: &str) -> Result<ReceiptStatus> {
        let raw: Option<RawUserOpReceipt> = self
            .call("eth_getUserOperationReceipt", json!([user_op_hash]))
            .await?;

        Ok(match raw {
            None => ReceiptStatus {
                included: false,
                tx_hash: None,
                success: None,
                reason: None,
            },
            Some(receipt) => ReceiptStatus {
                included: true,
                tx_hash: receipt.receipt.and_then(|r| r.transaction_hash),
                success: receipt.success,
                reason: receipt.reason,
            },
        })
    }
}

fn parse_hex_u64(raw: &str) -> u64 {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::Address;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn sample_user_op() -> UserOperation {
        UserOperation {
            sender: Address::ZERO,
            nonce: alloy::primitives::U256::from(1u64),
            call_data: vec![0xde, 0xad].into(),
            paymaster_context: None,
        }
    }

    #[tokio::test]
    async fn send_user_operation_returns_the_hash_and_provider_name() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(serde_json::json!({"method": "eth_sendUserOperation"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": "0xabc123"
            })))
            .mount(&mock_server)
            .await;

        let adapter = HttpBundlerAdapter::new("primary", mock_server.uri());
        let result = adapter.send_user_operation(&sample_user_op()).await.expect("send");

        assert_eq!(result.user_op_hash, "0xabc123");
        assert_eq!(result.provider, "primary");
    }

    #[tokio::test]
    async fn send_user_operation_surfaces_a_json_rpc_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "replacement underpriced"}
            })))
            .mount(&mock_server)
            .await;

        let adapter = HttpBundlerAdapter::new("primary", mock_server.uri());
        let err = adapter
            .send_user_operation(&sample_user_op())
            .await
            .expect_err("rpc error should surface");

        assert!(matches!(err, FleetError::BundlerSendFail(msg) if msg.contains("replacement underpriced")));
    }

    #[tokio::test]
    async fn get_receipt_reports_not_included_on_a_null_result() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(serde_json::json!({"method": "eth_getUserOperationReceipt"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": null
            })))
            .mount(&mock_server)
            .await;

        let adapter = HttpBundlerAdapter::new("primary", mock_server.uri());
        let status = adapter.get_receipt("0xabc123").await.expect("receipt call");

        assert!(!status.included);
        assert_eq!(status.tx_hash, None);
    }

    #[tokio::test]
    async fn get_receipt_parses_a_successful_inclusion() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "userOpHash": "0xabc123",
                    "success": true,
                    "reason": null,
                    "receipt": {"transactionHash": "0xdeadbeef"}
                }
            })))
            .mount(&mock_server)
            .await;

        let adapter = HttpBundlerAdapter::new("primary", mock_server.uri());
        let status = adapter.get_receipt("0xabc123").await.expect("receipt call");

        assert!(status.included);
        assert_eq!(status.success, Some(true));
        assert_eq!(status.tx_hash.as_deref(), Some("0xdeadbeef"));
    }

    #[tokio::test]
    async fn estimate_gas_parses_hex_quantities() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "preVerificationGas": "0x5208",
                    "verificationGasLimit": "0x186a0",
                    "callGasLimit": "0x30d40"
                }
            })))
            .mount(&mock_server)
            .await;

        let adapter = HttpBundlerAdapter::new("primary", mock_server.uri());
        let estimate = adapter.estimate_gas(&sample_user_op()).await.expect("estimate");

        assert_eq!(estimate.pre_verification, 0x5208);
        assert_eq!(estimate.verification, 0x186a0);
        assert_eq!(estimate.call, 0x30d40);
    }
}
