// src/blockchain/aggregator.rs

//! The swap-aggregation collaborator. Route finding and price ranking happen
//! upstream; this side only asks for quotes and for the calls that execute one.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::blockchain::ledger::Call;
use crate::blockchain::models::{Quote, QuoteRequest};
use crate::errors::{classify_message, ErrorKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregatorError {
    #[error("No quotes available for this swap")]
    NoQuotes,
    #[error("insufficient liquidity: {0}")]
    InsufficientLiquidity(String),
    #[error("quote expired: {0}")]
    QuoteExpired(String),
    #[error("slippage exceeded: {0}")]
    SlippageExceeded(String),
    #[error("aggregator returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("aggregator request failed: {0}")]
    Transport(String),
    #[error("invalid aggregator response: {0}")]
    Decode(String),
}

impl AggregatorError {
    /// Turns an upstream error body into the most specific variant.
    fn from_upstream(status: u16, message: String) -> Self {
        match classify_message(&message) {
            Some(ErrorKind::NoLiquidity) => AggregatorError::InsufficientLiquidity(message),
            Some(ErrorKind::QuoteExpired) => AggregatorError::QuoteExpired(message),
            Some(ErrorKind::SlippageExceeded) => AggregatorError::SlippageExceeded(message),
            _ => AggregatorError::Upstream { status, message },
        }
    }
}

#[async_trait]
pub trait SwapAggregator: Send + Sync {
    /// Quotes ranked best-first by the aggregator.
    async fn quotes(&self, request: &QuoteRequest) -> Result<Vec<Quote>, AggregatorError>;

    /// Calls that execute `quote` for `taker_address`, approval included.
    async fn build_swap(
        &self,
        quote: &Quote,
        taker_address: &str,
        slippage: f64,
    ) -> Result<Vec<Call>, AggregatorError>;
}

#[derive(Debug, Deserialize)]
struct BuildResponse {
    calls: Vec<Call>,
}

/// REST client for an aggregator exposing `/swap/v2/quotes` and `/swap/v2/build`.
#[derive(Clone)]
pub struct HttpAggregator {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpAggregator {
    pub fn new(base_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("x-api-key", key.expose_secret().as_str()),
            None => request,
        }
    }

    async fn read_json(response: Response) -> Result<Value, AggregatorError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AggregatorError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = upstream_message(&body);
            warn!("Aggregator returned {}: {}", status, message);
            return Err(AggregatorError::from_upstream(status.as_u16(), message));
        }

        serde_json::from_str(&body).map_err(|e| AggregatorError::Decode(e.to_string()))
    }
}

/// Pulls the human message out of an error body (`{"messages": [..]}`,
/// `{"message": ..}` or plain text).
fn upstream_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => {
            if let Some(messages) = v.get("messages").and_then(Value::as_array) {
                let joined: Vec<&str> = messages.iter().filter_map(Value::as_str).collect();
                if !joined.is_empty() {
                    return joined.join("; ");
                }
            }
            v.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string())
        }
        Err(_) => body.to_string(),
    }
}

#[async_trait]
impl SwapAggregator for HttpAggregator {
    async fn quotes(&self, request: &QuoteRequest) -> Result<Vec<Quote>, AggregatorError> {
        let url = format!("{}/swap/v2/quotes", self.base_url);
        let sell_amount = format!("{:#x}", request.sell_amount);
        debug!(
            "Requesting quotes {} -> {} for {}",
            request.sell_token_address, request.buy_token_address, sell_amount
        );

        let response = self
            .authorize(self.http.get(&url).query(&[
                ("sellTokenAddress", request.sell_token_address.as_str()),
                ("buyTokenAddress", request.buy_token_address.as_str()),
                ("sellAmount", sell_amount.as_str()),
                ("takerAddress", request.taker_address.as_str()),
            ]))
            .send()
            .await
            .map_err(|e| AggregatorError::Transport(e.to_string()))?;

        let body = Self::read_json(response).await?;
        serde_json::from_value(body).map_err(|e| AggregatorError::Decode(e.to_string()))
    }

    async fn build_swap(
        &self,
        quote: &Quote,
        taker_address: &str,
        slippage: f64,
    ) -> Result<Vec<Call>, AggregatorError> {
        let url = format!("{}/swap/v2/build", self.base_url);
        let payload = json!({
            "quoteId": quote.quote_id,
            "takerAddress": taker_address,
            "slippage": slippage,
            "includeApprove": true,
        });

        let response = self
            .authorize(self.http.post(&url).json(&payload))
            .send()
            .await
            .map_err(|e| AggregatorError::Transport(e.to_string()))?;

        let body = Self::read_json(response).await?;
        let built: BuildResponse =
            serde_json::from_value(body).map_err(|e| AggregatorError::Decode(e.to_string()))?;
        Ok(built.calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::U256;
    use mockito::{mock, Matcher};

    fn request() -> QuoteRequest {
        QuoteRequest {
            sell_token_address: "0xeth".into(),
            buy_token_address: "0xusdc".into(),
            sell_amount: U256::exp10(18),
            taker_address: "0xtaker".into(),
        }
    }

    fn sample_quote() -> Quote {
        serde_json::from_value(json!({
            "quoteId": "q-9",
            "sellTokenAddress": "0xeth",
            "buyTokenAddress": "0xusdc",
            "sellAmount": "0xde0b6b3a7640000",
            "buyAmount": "0xbebc2000"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn fetches_ranked_quotes() {
        let _m = mock("GET", Matcher::Regex(r"^/ranked/swap/v2/quotes".into()))
            .match_query(Matcher::UrlEncoded(
                "sellAmount".into(),
                "0xde0b6b3a7640000".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([
                    {"quoteId": "best", "sellTokenAddress": "0xeth", "buyTokenAddress": "0xusdc",
                     "sellAmount": "0xde0b6b3a7640000", "buyAmount": "0xbebc2000"},
                    {"quoteId": "second", "sellTokenAddress": "0xeth", "buyTokenAddress": "0xusdc",
                     "sellAmount": "0xde0b6b3a7640000", "buyAmount": "0xbebc1000"}
                ])
                .to_string(),
            )
            .create();

        let aggregator = HttpAggregator::new(format!("{}/ranked", mockito::server_url()), None);
        let quotes = aggregator.quotes(&request()).await.unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].quote_id, "best");
    }

    #[tokio::test]
    async fn liquidity_errors_become_structured() {
        let _m = mock("GET", Matcher::Regex(r"^/illiquid/swap/v2/quotes".into()))
            .with_status(400)
            .with_body(r#"{"messages":["INSUFFICIENT_LIQUIDITY"]}"#)
            .create();

        let aggregator = HttpAggregator::new(format!("{}/illiquid", mockito::server_url()), None);
        let err = aggregator.quotes(&request()).await.unwrap_err();
        assert_eq!(
            err,
            AggregatorError::InsufficientLiquidity("INSUFFICIENT_LIQUIDITY".into())
        );
    }

    #[tokio::test]
    async fn build_returns_calls() {
        let _m = mock("POST", "/build-ok/swap/v2/build")
            .match_header("x-api-key", "k")
            .match_body(Matcher::PartialJson(json!({
                "quoteId": "q-9",
                "includeApprove": true
            })))
            .with_status(200)
            .with_body(
                json!({"calls": [
                    {"contractAddress": "0xeth", "entrypoint": "approve(address,uint256)",
                     "calldata": ["0xrouter", "1000000000000000000"]},
                    {"contractAddress": "0xrouter", "entrypoint": "swap(bytes)", "calldata": ["0x"]}
                ]})
                .to_string(),
            )
            .create();

        let aggregator = HttpAggregator::new(
            format!("{}/build-ok", mockito::server_url()),
            Some(SecretString::new("k".into())),
        );
        let calls = aggregator
            .build_swap(&sample_quote(), "0xtaker", 0.01)
            .await
            .unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].entrypoint, "approve(address,uint256)");
    }

    #[tokio::test]
    async fn expired_quote_on_build() {
        let _m = mock("POST", "/build-expired/swap/v2/build")
            .with_status(400)
            .with_body(r#"{"messages":["Quote expired"]}"#)
            .create();

        let aggregator =
            HttpAggregator::new(format!("{}/build-expired", mockito::server_url()), None);
        let err = aggregator
            .build_swap(&sample_quote(), "0xtaker", 0.01)
            .await
            .unwrap_err();
        assert!(matches!(err, AggregatorError::QuoteExpired(_)));
    }
}
