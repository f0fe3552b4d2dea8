//! The [`SwapEncoder`] capability: hides the DEX's calldata encoding
//! (universal router, permit flow, v4 quoter) from the execution engine.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::error::Result;
use crate::ports::account_provider::{Call, ReceiptOutcome};

/// Parameters for a buy or sell swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapParams {
    /// Token being spent.
    pub from_token: Address,
    /// Token being acquired.
    pub to_token: Address,
    /// Amount of `from_token` to spend, in wei.
    pub amount_in: U256,
    /// Minimum acceptable amount of `to_token`, derived from slippage.
    pub min_amount_out: U256,
}

/// Encodes DEX swap calldata and decodes swap outcomes; also answers
/// current-value quotes for the swing loop. All DEX- and chain-specific
/// detail (universal router, permit2, v4 quoter) hides behind this trait.
#[async_trait]
pub trait SwapEncoder: Send + Sync {
    /// Encode a native-token-to-coin buy as a user-operation call batch.
    async fn encode_buy(&self, params: SwapParams) -> Result<Vec<Call>>;

    /// Encode a coin-to-native-token sell as a user-operation call batch.
    async fn encode_sell(&self, params: SwapParams) -> Result<Vec<Call>>;

    /// Extract the amount of `to_token` actually received from a completed
    /// swap's receipt.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::FleetError::QuoteFailed`] if the receipt
    /// carries no decodable swap-output log.
    fn parse_amount_out(&self, receipt: &ReceiptOutcome) -> Result<U256>;

    /// Quote the current native-token value of `amount` units of `coin`,
    /// used by the swing loop to compute live P&L.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::FleetError::QuoteFailed`] if no route/quote
    /// is available.
    async fn quote_coin_to_eth(&self, coin: Address, amount: U256) -> Result<U256>;
}

#[async_trait]
impl<T: SwapEncoder + ?Sized> SwapEncoder for std::sync::Arc<T> {
    async fn encode_buy(&self, params: SwapParams) -> Result<Vec<Call>> {
        (**self).encode_buy(params).await
    }

    async fn encode_sell(&self, params: SwapParams) -> Result<Vec<Call>> {
        (**self).encode_sell(params).await
    }

    fn parse_amount_out(&self, receipt: &ReceiptOutcome) -> Result<U256> {
        (**self).parse_amount_out(receipt)
    }

    async fn quote_coin_to_eth(&self, coin: Address, amount: U256) -> Result<U256> {
        (**self).quote_coin_to_eth(coin, amount).await
    }
}
