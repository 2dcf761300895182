// src/blockchain/identity.rs

//! ERC-8004 style agent registries: identity (an ERC-721 whose token id is the
//! agent id), plus the optional reputation and validation registries.

use std::sync::Arc;

use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::blockchain::abi::event_topic;
use crate::blockchain::ledger::{Call, Ledger, LedgerError, Receipt};

const REGISTER_WITH_METADATA: &str =
    "register_with_metadata(string,(string,string)[]) returns (uint256)";
const GET_METADATA: &str = "get_metadata(uint256,string) returns (string)";
const AGENT_EXISTS: &str = "agent_exists(uint256) returns (bool)";
const GET_REPUTATION_SUMMARY: &str = "get_reputation_summary(uint256) returns (uint8,uint256)";
const GET_VALIDATION_COUNT: &str = "get_validation_count(uint256) returns (uint256)";
const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
}

#[derive(Clone)]
pub struct IdentityRegistry {
    ledger: Arc<dyn Ledger>,
    address: String,
}

impl IdentityRegistry {
    pub fn new(ledger: Arc<dyn Ledger>, address: impl Into<String>) -> Self {
        Self {
            ledger,
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn register_call(&self, token_uri: &str, metadata: &[MetadataEntry]) -> Call {
        let entries: Vec<Value> = metadata.iter().map(|m| json!([m.key, m.value])).collect();
        Call::new(self.address.clone(), REGISTER_WITH_METADATA)
            .with_calldata(vec![json!(token_uri), Value::Array(entries)])
    }

    pub async fn exists(&self, agent_id: U256) -> Result<bool, LedgerError> {
        let call = Call::new(self.address.clone(), AGENT_EXISTS)
            .with_calldata(vec![json!(agent_id.to_string())]);
        let out = self.ledger.call(&call).await?;
        Ok(out.first().map(|v| v == "true").unwrap_or(false))
    }

    pub async fn metadata(&self, agent_id: U256, key: &str) -> Result<String, LedgerError> {
        let call = Call::new(self.address.clone(), GET_METADATA)
            .with_calldata(vec![json!(agent_id.to_string()), json!(key)]);
        let out = self.ledger.call(&call).await?;
        out.into_iter()
            .next()
            .ok_or_else(|| LedgerError::Rpc(format!("get_metadata returned no data for '{}'", key)))
    }

    /// The id minted by a registration, read from the registry's own
    /// `Transfer(0x0, owner, id)` event.
    pub fn agent_id_from_receipt(&self, receipt: &Receipt) -> Option<U256> {
        let topic = event_topic(TRANSFER_EVENT);
        receipt
            .events
            .iter()
            .filter(|e| e.from_address.eq_ignore_ascii_case(&self.address))
            .find(|e| {
                e.keys.len() == 4
                    && e.keys[0].eq_ignore_ascii_case(&topic)
                    && is_zero_word(&e.keys[1])
            })
            .and_then(|e| parse_word(&e.keys[3]))
    }
}

fn parse_word(word: &str) -> Option<U256> {
    U256::from_str_radix(word.trim_start_matches("0x"), 16).ok()
}

fn is_zero_word(word: &str) -> bool {
    parse_word(word).map(|w| w.is_zero()).unwrap_or(false)
}

fn uint_at(out: &[String], index: usize, what: &str) -> Result<U256, LedgerError> {
    out.get(index)
        .and_then(|v| U256::from_dec_str(v).ok())
        .ok_or_else(|| LedgerError::Rpc(format!("{} returned unexpected data: {:?}", what, out)))
}

/// `(average score 0-100, feedback count)`.
pub async fn reputation_summary(
    ledger: &dyn Ledger,
    registry: &str,
    agent_id: U256,
) -> Result<(u8, U256), LedgerError> {
    let call = Call::new(registry, GET_REPUTATION_SUMMARY)
        .with_calldata(vec![json!(agent_id.to_string())]);
    let out = ledger.call(&call).await?;
    let score = uint_at(&out, 0, "get_reputation_summary")?;
    let count = uint_at(&out, 1, "get_reputation_summary")?;
    Ok((score.low_u32().min(u8::MAX as u32) as u8, count))
}

pub async fn validation_count(
    ledger: &dyn Ledger,
    registry: &str,
    agent_id: U256,
) -> Result<U256, LedgerError> {
    let call = Call::new(registry, GET_VALIDATION_COUNT)
        .with_calldata(vec![json!(agent_id.to_string())]);
    let out = ledger.call(&call).await?;
    uint_at(&out, 0, "get_validation_count")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::ledger::{
        DeployRequest, Deployment, Event, FeeEstimate, TransactionStatus,
    };
    use crate::blockchain::paymaster::ExecutionOptions;
    use async_trait::async_trait;

    struct NoLedger;

    #[async_trait]
    impl Ledger for NoLedger {
        fn account_address(&self) -> String {
            "0xaccount".into()
        }
        async fn call(&self, _call: &Call) -> Result<Vec<String>, LedgerError> {
            Ok(vec!["true".into()])
        }
        async fn execute(&self, _: &[Call], _: &ExecutionOptions) -> Result<String, LedgerError> {
            Ok("0x1".into())
        }
        async fn transaction_status(&self, _: &str) -> Result<TransactionStatus, LedgerError> {
            Ok(TransactionStatus::Pending)
        }
        async fn estimate_fee(&self, _: &[Call]) -> Result<FeeEstimate, LedgerError> {
            Err(LedgerError::Rpc("unused".into()))
        }
        async fn deploy(
            &self,
            _: &DeployRequest,
            _: &ExecutionOptions,
        ) -> Result<Deployment, LedgerError> {
            Err(LedgerError::Rpc("unused".into()))
        }
    }

    fn word(n: u64) -> String {
        format!("0x{:064x}", n)
    }

    #[test]
    fn register_call_nests_metadata_as_tuples() {
        let registry = IdentityRegistry::new(Arc::new(NoLedger), "0xregistry");
        let call = registry.register_call(
            "ipfs://agent",
            &[MetadataEntry {
                key: "agentName".into(),
                value: "scout".into(),
            }],
        );
        assert_eq!(
            call.calldata,
            vec![json!("ipfs://agent"), json!([["agentName", "scout"]])]
        );
    }

    #[test]
    fn agent_id_comes_from_mint_event() {
        let registry = IdentityRegistry::new(Arc::new(NoLedger), "0xRegistry");
        let receipt = Receipt {
            transaction_hash: "0xabc".into(),
            block_number: Some(1),
            contract_address: None,
            events: vec![
                Event {
                    from_address: "0xother".into(),
                    keys: vec![event_topic(TRANSFER_EVENT), word(0), word(1), word(99)],
                    data: vec![],
                },
                Event {
                    from_address: "0xregistry".into(),
                    keys: vec![event_topic(TRANSFER_EVENT), word(0), word(7), word(42)],
                    data: vec![],
                },
            ],
        };
        assert_eq!(registry.agent_id_from_receipt(&receipt), Some(U256::from(42)));
    }

    #[tokio::test]
    async fn exists_reads_boolean_output() {
        let registry = IdentityRegistry::new(Arc::new(NoLedger), "0xregistry");
        assert!(registry.exists(U256::from(1)).await.unwrap());
    }
}
