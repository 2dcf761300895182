// src/blockchain/ledger.rs

//! The ledger collaborator: reads, transaction submission, status and fee
//! estimation. Nonce sequencing for concurrent writes is the implementation's
//! concern, not the dispatcher's.

use std::time::Duration;

use async_trait::async_trait;
use ethers_core::types::U256;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::blockchain::paymaster::ExecutionOptions;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid call: {0}")]
    InvalidCall(String),
    #[error("rpc request failed: {0}")]
    Rpc(String),
    #[error("transaction {hash} reverted: {reason}")]
    Reverted { hash: String, reason: String },
    #[error("transaction {hash} was rejected: {reason}")]
    Rejected { hash: String, reason: String },
    #[error("{0} calls need a smart account; a plain account executes one call per transaction")]
    BatchUnsupported(usize),
    #[error("fee sponsorship requested but no paymaster is configured")]
    PaymasterUnconfigured,
    #[error("paymaster request failed: {0}")]
    Paymaster(String),
}

/// A single contract invocation.
///
/// `entrypoint` is a human-readable signature such as
/// `transfer(address,uint256) returns (bool)`; `calldata` values are coerced
/// against its parameter types.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub contract_address: String,
    pub entrypoint: String,
    #[serde(default)]
    pub calldata: Vec<Value>,
}

impl Call {
    pub fn new(contract_address: impl Into<String>, entrypoint: impl Into<String>) -> Self {
        Self {
            contract_address: contract_address.into(),
            entrypoint: entrypoint.into(),
            calldata: Vec::new(),
        }
    }

    pub fn with_calldata(mut self, calldata: Vec<Value>) -> Self {
        self.calldata = calldata;
        self
    }
}

/// An event emitted during execution. `keys` are the indexed topics, `data`
/// the non-indexed payload split into words.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub from_address: String,
    pub keys: Vec<String>,
    pub data: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    pub events: Vec<Event>,
}

/// What the ledger currently knows about a submitted transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionStatus {
    NotFound,
    Pending,
    Succeeded(Receipt),
    Reverted { receipt: Receipt, reason: String },
    Rejected { reason: String },
}

impl TransactionStatus {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Succeeded(_)
                | TransactionStatus::Reverted { .. }
                | TransactionStatus::Rejected { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeeEstimate {
    /// Total fee in the native fee token's base units.
    pub overall_fee: U256,
    pub gas_units: U256,
    pub gas_price: U256,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeployRequest {
    /// 0x-prefixed creation bytecode.
    pub bytecode: String,
    pub constructor_types: Vec<String>,
    pub constructor_calldata: Vec<Value>,
    /// 0x-prefixed 32-byte salt; a random one is used when absent.
    pub salt: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub transaction_hash: String,
    pub contract_address: String,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Address of the account that signs and pays for writes.
    fn account_address(&self) -> String;

    /// Read-only call; returns decoded outputs as strings.
    async fn call(&self, call: &Call) -> Result<Vec<String>, LedgerError>;

    /// Submits all `calls` as one transaction and returns its hash.
    async fn execute(
        &self,
        calls: &[Call],
        options: &ExecutionOptions,
    ) -> Result<String, LedgerError>;

    async fn transaction_status(&self, hash: &str) -> Result<TransactionStatus, LedgerError>;

    async fn estimate_fee(&self, calls: &[Call]) -> Result<FeeEstimate, LedgerError>;

    async fn deploy(
        &self,
        request: &DeployRequest,
        options: &ExecutionOptions,
    ) -> Result<Deployment, LedgerError>;
}

/// Blocks until `hash` is final. The first status read happens immediately;
/// later reads are spaced by `poll_interval`. No timeout is applied here.
pub async fn wait_for_finality(
    ledger: &dyn Ledger,
    hash: &str,
    poll_interval: Duration,
) -> Result<Receipt, LedgerError> {
    let mut polls = 0u32;
    loop {
        polls += 1;
        match ledger.transaction_status(hash).await? {
            TransactionStatus::Succeeded(receipt) => {
                debug!("Transaction {} finalized after {} status read(s)", hash, polls);
                return Ok(receipt);
            }
            TransactionStatus::Reverted { reason, .. } => {
                return Err(LedgerError::Reverted {
                    hash: hash.to_string(),
                    reason,
                });
            }
            TransactionStatus::Rejected { reason } => {
                return Err(LedgerError::Rejected {
                    hash: hash.to_string(),
                    reason,
                });
            }
            TransactionStatus::NotFound | TransactionStatus::Pending => {
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}
