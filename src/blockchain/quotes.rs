// src/blockchain/quotes.rs

use std::sync::Arc;

use ethers_core::types::U256;
use tracing::{debug, info};

use crate::blockchain::aggregator::{AggregatorError, SwapAggregator};
use crate::blockchain::ledger::Ledger;
use crate::blockchain::models::{Quote, QuoteRequest};
use crate::blockchain::paymaster::ExecutionOptions;
use crate::errors::OperationError;

/// Fetches quotes from the aggregator and executes the chosen one.
///
/// Ranking is the aggregator's job: the first quote returned is the best one.
#[derive(Clone)]
pub struct QuoteBroker {
    aggregator: Arc<dyn SwapAggregator>,
    ledger: Arc<dyn Ledger>,
}

impl QuoteBroker {
    pub fn new(aggregator: Arc<dyn SwapAggregator>, ledger: Arc<dyn Ledger>) -> Self {
        Self { aggregator, ledger }
    }

    pub async fn best_quote(
        &self,
        sell_token: &str,
        buy_token: &str,
        sell_amount: U256,
        taker_address: &str,
    ) -> Result<Quote, AggregatorError> {
        let request = QuoteRequest {
            sell_token_address: sell_token.to_string(),
            buy_token_address: buy_token.to_string(),
            sell_amount,
            taker_address: taker_address.to_string(),
        };
        let quotes = self.aggregator.quotes(&request).await?;
        debug!("Aggregator returned {} quote(s)", quotes.len());
        quotes.into_iter().next().ok_or(AggregatorError::NoQuotes)
    }

    /// Builds the swap calls (approval included) and submits them as a single
    /// transaction. Returns the transaction hash without waiting for finality.
    /// `slippage` is expected to be range-checked by the caller.
    pub async fn execute_quote(
        &self,
        quote: &Quote,
        slippage: f64,
        options: &ExecutionOptions,
    ) -> Result<String, OperationError> {
        let taker = self.ledger.account_address();
        let calls = self.aggregator.build_swap(quote, &taker, slippage).await?;
        info!(
            "Executing quote {} as {} call(s) with slippage {}",
            quote.quote_id,
            calls.len(),
            slippage
        );
        let hash = self.ledger.execute(&calls, options).await?;
        Ok(hash)
    }
}
