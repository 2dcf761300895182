// src/tools/args.rs

//! Typed arguments, one struct per tool. These are deserialized from the
//! argument object after it passed schema validation.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::blockchain::identity::MetadataEntry;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceArgs {
    pub token: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferArgs {
    pub recipient: String,
    pub token: String,
    pub amount: String,
    #[serde(default)]
    pub gas_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCallArgs {
    pub contract_address: String,
    pub entrypoint: String,
    #[serde(default)]
    pub calldata: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeArgs {
    pub contract_address: String,
    pub entrypoint: String,
    #[serde(default)]
    pub calldata: Vec<Value>,
    #[serde(default)]
    pub gas_token: Option<String>,
}

fn default_slippage() -> f64 {
    0.01
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapArgs {
    pub sell_token: String,
    pub buy_token: String,
    pub amount: String,
    #[serde(default = "default_slippage")]
    pub slippage: f64,
    #[serde(default)]
    pub gasless: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteArgs {
    pub sell_token: String,
    pub buy_token: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployArgs {
    pub bytecode: String,
    #[serde(default)]
    pub constructor_types: Vec<String>,
    #[serde(default)]
    pub constructor_calldata: Vec<Value>,
    #[serde(default)]
    pub salt: Option<String>,
    #[serde(default)]
    pub gas_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAgentArgs {
    pub token_uri: String,
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
    #[serde(default)]
    pub gas_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfoArgs {
    pub agent_id: String,
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    GetBalance(BalanceArgs),
    Transfer(TransferArgs),
    CallContract(ContractCallArgs),
    InvokeContract(InvokeArgs),
    Swap(SwapArgs),
    GetQuote(QuoteArgs),
    EstimateFee(ContractCallArgs),
    DeployContract(DeployArgs),
    RegisterAgent(RegisterAgentArgs),
    GetAgentInfo(AgentInfoArgs),
}

impl ToolCall {
    pub fn parse(name: &str, arguments: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json!({ "name": name, "arguments": arguments }))
    }
}
