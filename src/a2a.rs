// src/a2a.rs

//! Agent-to-agent surface: an agent card built from the on-chain identity
//! registry, and a task view that reads straight through to transaction
//! status. There is no task store; every status query is one ledger read.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ethers_core::types::U256;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::blockchain::identity::{reputation_summary, validation_count, IdentityRegistry};
use crate::blockchain::ledger::{Ledger, TransactionStatus};
use crate::config::Config;
use crate::errors::OperationError;

pub const PROTOCOL_CONTEXT: &str = "https://a2a-protocol.org/schema/1.0";
const CARD_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentIdentity {
    pub registry_address: String,
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reputation_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub version: String,
    pub skills: Vec<String>,
    pub identity: AgentIdentity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Submitted,
    Working,
    Completed,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub state: TaskState,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct A2aAdapter {
    ledger: Arc<dyn Ledger>,
    identity: IdentityRegistry,
    reputation_registry: Option<String>,
    validation_registry: Option<String>,
}

impl A2aAdapter {
    pub fn new(ledger: Arc<dyn Ledger>, identity_registry: impl Into<String>) -> Self {
        Self {
            identity: IdentityRegistry::new(ledger.clone(), identity_registry),
            ledger,
            reputation_registry: None,
            validation_registry: None,
        }
    }

    /// Returns `None` when no identity registry is configured.
    pub fn from_config(config: &Config, ledger: Arc<dyn Ledger>) -> Option<Self> {
        let registry = config.identity_registry_address.clone()?;
        Some(
            Self::new(ledger, registry)
                .with_reputation_registry(config.reputation_registry_address.clone())
                .with_validation_registry(config.validation_registry_address.clone()),
        )
    }

    pub fn with_reputation_registry(mut self, address: Option<String>) -> Self {
        self.reputation_registry = address;
        self
    }

    pub fn with_validation_registry(mut self, address: Option<String>) -> Self {
        self.validation_registry = address;
        self
    }

    pub async fn agent_card(&self, agent_id: &str) -> Result<AgentCard, OperationError> {
        let id = U256::from_dec_str(agent_id.trim()).map_err(|_| {
            OperationError::invalid_arguments(format!("agentId '{}' is not a decimal id", agent_id))
        })?;
        if !self.identity.exists(id).await? {
            return Err(OperationError::invalid_arguments(format!(
                "Agent {} is not registered",
                agent_id
            )));
        }

        let (name, description, endpoint, capabilities) = tokio::try_join!(
            self.identity.metadata(id, "agentName"),
            self.identity.metadata(id, "description"),
            self.identity.metadata(id, "a2aEndpoint"),
            self.identity.metadata(id, "capabilities"),
        )?;

        let ledger = self.ledger.as_ref();
        let reputation = async {
            match &self.reputation_registry {
                Some(registry) => reputation_summary(ledger, registry, id).await.map(Some),
                None => Ok(None),
            }
        };
        let validations = async {
            match &self.validation_registry {
                Some(registry) => validation_count(ledger, registry, id).await.map(Some),
                None => Ok(None),
            }
        };
        let (reputation, validations) = tokio::try_join!(reputation, validations)?;

        let skills = capabilities
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Ok(AgentCard {
            name,
            description,
            url: Some(endpoint).filter(|u| !u.is_empty()),
            version: CARD_VERSION.to_string(),
            skills,
            identity: AgentIdentity {
                registry_address: self.identity.address().to_string(),
                agent_id: id.to_string(),
                reputation_score: reputation.map(|(score, _)| score),
                validation_count: validations.map(|c| c.to_string()),
                wallet_address: Some(self.ledger.account_address()),
            },
        })
    }

    pub fn task_from_transaction(&self, transaction_hash: &str, prompt: &str) -> Task {
        let now = Utc::now();
        Task {
            id: transaction_hash.to_string(),
            state: TaskState::Submitted,
            prompt: prompt.to_string(),
            result: None,
            transaction_hash: Some(transaction_hash.to_string()),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// One status read per call. Read failures report the task as still
    /// working rather than failing the query.
    pub async fn task_status(&self, task_id: &str) -> Task {
        let mut task = Task {
            id: task_id.to_string(),
            state: TaskState::Working,
            prompt: String::new(),
            result: None,
            transaction_hash: Some(task_id.to_string()),
            error: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: Utc::now(),
        };

        match self.ledger.transaction_status(task_id).await {
            Ok(TransactionStatus::Succeeded(receipt)) => {
                task.state = TaskState::Completed;
                task.result = serde_json::to_string_pretty(&receipt).ok();
            }
            Ok(TransactionStatus::Reverted { reason, .. }) => {
                task.state = TaskState::Failed;
                task.error = Some(if reason.is_empty() {
                    "Transaction reverted".to_string()
                } else {
                    reason
                });
            }
            Ok(TransactionStatus::Rejected { reason }) => {
                task.state = TaskState::Canceled;
                task.error = Some(reason);
            }
            Ok(TransactionStatus::Pending) | Ok(TransactionStatus::NotFound) => {}
            Err(e) => debug!("Status read for task {} failed: {}", task_id, e),
        }
        task
    }

    /// The `/.well-known/agent.json` discovery document.
    pub async fn well_known_agent_json(
        &self,
        agent_id: &str,
        base_url: &str,
    ) -> Result<Value, OperationError> {
        let card = self.agent_card(agent_id).await?;
        let base = base_url.trim_end_matches('/');
        Ok(json!({
            "@context": PROTOCOL_CONTEXT,
            "type": "Agent",
            "id": format!("{}/.well-known/agent.json", base),
            "name": card.name,
            "description": card.description,
            "url": base,
            "version": card.version,
            "capabilities": card.skills,
            "identity": card.identity,
            "endpoints": {
                "tasks": format!("{}/api/tasks", base),
                "status": format!("{}/api/tasks/:id", base),
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::ledger::{
        Call, DeployRequest, Deployment, FeeEstimate, LedgerError, Receipt,
    };
    use crate::blockchain::paymaster::ExecutionOptions;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RegistryLedger {
        registered: bool,
        status: Result<TransactionStatus, LedgerError>,
        status_reads: AtomicUsize,
    }

    impl RegistryLedger {
        fn new(status: Result<TransactionStatus, LedgerError>) -> Self {
            Self {
                registered: true,
                status,
                status_reads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Ledger for RegistryLedger {
        fn account_address(&self) -> String {
            "0xwallet".into()
        }
        async fn call(&self, call: &Call) -> Result<Vec<String>, LedgerError> {
            let out = if call.entrypoint.starts_with("agent_exists") {
                self.registered.to_string()
            } else if call.entrypoint.starts_with("get_reputation_summary") {
                return Ok(vec!["87".into(), "12".into()]);
            } else if call.entrypoint.starts_with("get_validation_count") {
                "3".into()
            } else {
                match call.calldata[1].as_str() {
                    Some("agentName") => "scout".into(),
                    Some("description") => "finds liquidity".into(),
                    Some("a2aEndpoint") => "".into(),
                    Some("capabilities") => "swap, quote,,balance".into(),
                    _ => return Err(LedgerError::Rpc("unknown key".into())),
                }
            };
            Ok(vec![out])
        }
        async fn execute(&self, _: &[Call], _: &ExecutionOptions) -> Result<String, LedgerError> {
            Err(LedgerError::Rpc("unused".into()))
        }
        async fn transaction_status(&self, _: &str) -> Result<TransactionStatus, LedgerError> {
            self.status_reads.fetch_add(1, Ordering::SeqCst);
            self.status.clone()
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

    fn receipt() -> Receipt {
        Receipt {
            transaction_hash: "0xabc".into(),
            block_number: Some(10),
            contract_address: None,
            events: vec![],
        }
    }

    #[tokio::test]
    async fn card_reads_registry_metadata() {
        let ledger = Arc::new(RegistryLedger::new(Ok(TransactionStatus::Pending)));
        let adapter = A2aAdapter::new(ledger, "0xidentity")
            .with_reputation_registry(Some("0xreputation".into()))
            .with_validation_registry(Some("0xvalidation".into()));

        let card = adapter.agent_card("7").await.unwrap();
        assert_eq!(card.name, "scout");
        assert_eq!(card.url, None);
        assert_eq!(card.skills, vec!["swap", "quote", "balance"]);
        assert_eq!(card.identity.reputation_score, Some(87));
        assert_eq!(card.identity.validation_count.as_deref(), Some("3"));
        assert_eq!(card.identity.wallet_address.as_deref(), Some("0xwallet"));
    }

    #[tokio::test]
    async fn unregistered_agent_is_invalid_arguments() {
        let mut ledger = RegistryLedger::new(Ok(TransactionStatus::Pending));
        ledger.registered = false;
        let adapter = A2aAdapter::new(Arc::new(ledger), "0xidentity");
        let err = adapter.agent_card("7").await.unwrap_err();
        assert!(matches!(err, OperationError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn task_status_maps_each_ledger_state_with_one_read() {
        let cases = vec![
            (Ok(TransactionStatus::Succeeded(receipt())), TaskState::Completed),
            (
                Ok(TransactionStatus::Reverted {
                    receipt: receipt(),
                    reason: String::new(),
                }),
                TaskState::Failed,
            ),
            (
                Ok(TransactionStatus::Rejected {
                    reason: "nonce too low".into(),
                }),
                TaskState::Canceled,
            ),
            (Ok(TransactionStatus::Pending), TaskState::Working),
            (Err(LedgerError::Rpc("timeout".into())), TaskState::Working),
        ];

        for (status, expected) in cases {
            let ledger = Arc::new(RegistryLedger::new(status));
            let adapter = A2aAdapter::new(ledger.clone(), "0xidentity");
            let task = adapter.task_status("0xabc").await;
            assert_eq!(task.state, expected);
            assert_eq!(ledger.status_reads.load(Ordering::SeqCst), 1);
            if expected == TaskState::Failed {
                assert_eq!(task.error.as_deref(), Some("Transaction reverted"));
            }
            if expected == TaskState::Completed {
                assert!(task.result.unwrap().contains("0xabc"));
            }
        }
    }

    #[tokio::test]
    async fn well_known_document_links_endpoints() {
        let ledger = Arc::new(RegistryLedger::new(Ok(TransactionStatus::Pending)));
        let adapter = A2aAdapter::new(ledger, "0xidentity");
        let doc = adapter
            .well_known_agent_json("7", "https://agent.example/")
            .await
            .unwrap();
        assert_eq!(doc["@context"], PROTOCOL_CONTEXT);
        assert_eq!(doc["id"], "https://agent.example/.well-known/agent.json");
        assert_eq!(doc["endpoints"]["status"], "https://agent.example/api/tasks/:id");
        assert_eq!(doc["identity"]["agentId"], "7");
        assert_eq!(doc["capabilities"][0], "swap");
    }

    #[test]
    fn new_task_starts_submitted() {
        let ledger = Arc::new(RegistryLedger::new(Ok(TransactionStatus::Pending)));
        let adapter = A2aAdapter::new(ledger, "0xidentity");
        let task = adapter.task_from_transaction("0xdef", "swap 1 ETH");
        assert_eq!(task.id, "0xdef");
        assert_eq!(task.state, TaskState::Submitted);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["state"], "submitted");
        assert!(json["createdAt"].is_i64());
    }
}
