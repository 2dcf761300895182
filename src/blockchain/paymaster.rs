// src/blockchain/paymaster.rs

//! Fee sponsorship: choosing how gas is paid, and relaying sponsored or
//! gas-token transactions through a paymaster service.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::blockchain::ledger::LedgerError;

/// How the gas for a state-changing call is paid.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExecutionOptions {
    /// The account pays in the chain's native fee token.
    #[default]
    Native,
    /// A paymaster covers the full cost.
    Sponsored,
    /// Gas is paid in the given ERC-20 token through the paymaster.
    GasToken(String),
}

impl ExecutionOptions {
    pub fn is_sponsored(&self) -> bool {
        matches!(self, ExecutionOptions::Sponsored)
    }

    pub fn is_gasless(&self) -> bool {
        matches!(self, ExecutionOptions::GasToken(_))
    }

    /// Paymaster fee mode, or `None` when no paymaster is involved.
    pub fn fee_mode(&self) -> Option<FeeMode> {
        match self {
            ExecutionOptions::Native => None,
            ExecutionOptions::Sponsored => Some(FeeMode::Sponsored),
            ExecutionOptions::GasToken(token) => Some(FeeMode::Default {
                gas_token: token.clone(),
            }),
        }
    }
}

/// Picks the execution mode for a write.
///
/// An explicit gas token always wins over blanket sponsorship: a caller who
/// names a token wants gas metered in that token.
pub fn select_execution_options(
    has_api_credentials: bool,
    explicit_gas_token: Option<&str>,
) -> ExecutionOptions {
    match (has_api_credentials, explicit_gas_token) {
        (_, Some(token)) => ExecutionOptions::GasToken(token.to_string()),
        (true, None) => ExecutionOptions::Sponsored,
        (false, None) => ExecutionOptions::Native,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FeeMode {
    Sponsored,
    Default {
        #[serde(rename = "gasToken")]
        gas_token: String,
    },
}

/// A call in the shape the paymaster relays: target, calldata and value, all
/// 0x-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayedCall {
    pub to: String,
    pub data: String,
    pub value: String,
}

/// JSON-RPC client for the paymaster relay.
#[derive(Clone)]
pub struct PaymasterClient {
    http: Client,
    url: String,
    api_key: Option<SecretString>,
}

impl PaymasterClient {
    pub fn new(url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
            api_key,
        }
    }

    /// Relays `calls` on behalf of `user_address` and returns the transaction hash.
    pub async fn execute(
        &self,
        user_address: &str,
        calls: &[RelayedCall],
        fee_mode: &FeeMode,
        signature: &str,
    ) -> Result<String, LedgerError> {
        info!(
            "Relaying {} call(s) for {} through paymaster ({:?})",
            calls.len(),
            user_address,
            fee_mode
        );

        let payload = json!({
            "jsonrpc": "2.0",
            "method": "paymaster_executeTransaction",
            "params": {
                "userAddress": user_address,
                "calls": calls,
                "feeMode": fee_mode,
                "signature": signature,
            },
            "id": 1
        });

        let mut request = self.http.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key.expose_secret().as_str());
        }

        let response: Value = request
            .send()
            .await
            .map_err(|e| LedgerError::Paymaster(e.to_string()))?
            .json()
            .await
            .map_err(|e| LedgerError::Paymaster(format!("invalid response body: {}", e)))?;

        if let Some(err) = response.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(LedgerError::Paymaster(message));
        }

        let hash = response["result"]["transactionHash"]
            .as_str()
            .ok_or_else(|| {
                LedgerError::Paymaster(format!("missing transactionHash in {}", response))
            })?;
        debug!("Paymaster accepted transaction {}", hash);
        Ok(hash.to_string())
    }
}
