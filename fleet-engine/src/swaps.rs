//! A boundary-stub [`SwapEncoder`].
//!
//! DEX calldata encoding and pricing are external collaborators this crate
//! hides behind the trait (see `fleet_core::ports::swap_encoder`); this is
//! the same kind of production placeholder `StubAccountProvider` is for
//! signing — a 1:1 quote and a pass-through call so the engine's dispatch
//! path, position bookkeeping, and bundler routing can run end to end
//! without a real DEX integration wired in.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use fleet_core::ports::{Call, ReceiptOutcome, SwapEncoder, SwapParams};
use fleet_core::{FleetError, Result};

/// A no-op swap encoder: one value-transfer call per swap, a 1:1 quote.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubSwapEncoder;

#[async_trait]
impl SwapEncoder for StubSwapEncoder {
    async fn encode_buy(&self, params: SwapParams) -> Result<Vec<Call>> {
        Ok(vec![Call::value_transfer(params.to_token, params.amount_in)])
    }

    async fn encode_sell(&self, params: SwapParams) -> Result<Vec<Call>> {
        Ok(vec![Call::value_transfer(params.to_token, params.amount_in)])
    }

    fn parse_amount_out(&self, receipt: &ReceiptOutcome) -> Result<U256> {
        if receipt.success == Some(true) {
            Ok(U256::ZERO)
        } else {
            Err(FleetError::QuoteFailed("no decodable swap output on a failed receipt".into()))
        }
    }

    async fn quote_coin_to_eth(&self, _coin: Address, amount: U256) -> Result<U256> {
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quote_is_one_to_one() {
        let encoder = StubSwapEncoder;
        let quoted = encoder.quote_coin_to_eth(Address::ZERO, U256::from(500u64)).await.unwrap();
        assert_eq!(quoted, U256::from(500u64));
    }

    #[tokio::test]
    async fn encode_buy_produces_a_single_call() {
        let encoder = StubSwapEncoder;
        let params = SwapParams {
            from_token: Address::ZERO,
            to_token: Address::repeat_byte(1),
            amount_in: U256::from(100u64),
            min_amount_out: U256::from(95u64),
        };
        let calls = encoder.encode_buy(params).await.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to, params.to_token);
    }
}
