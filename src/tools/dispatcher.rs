// src/tools/dispatcher.rs

//! The operation dispatcher: one entry point that takes a tool name and an
//! untyped argument bag and always answers with a [`ToolOutcome`].
//!
//! Per invocation the work moves through
//! `Received -> Validated -> (TokenResolved) -> (AmountParsed) ->
//! (OptionsSelected) -> Submitted -> (AwaitingFinality) -> Completed | Failed`.
//! Nothing is retried here; state-changing tools return only once their
//! transaction is final.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ethers_core::types::U256;
use futures::future::join_all;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::blockchain::aggregator::SwapAggregator;
use crate::blockchain::amount::{to_base_units, to_human_units};
use crate::blockchain::erc20;
use crate::blockchain::identity::IdentityRegistry;
use crate::blockchain::ledger::{wait_for_finality, Call, DeployRequest, Ledger, Receipt};
use crate::blockchain::models::{Quote, QuoteSummary};
use crate::blockchain::paymaster::{select_execution_options, ExecutionOptions};
use crate::blockchain::quotes::QuoteBroker;
use crate::blockchain::tokens::{is_address_literal, TokenRegistry};
use crate::errors::OperationError;
use crate::tools::args::{
    AgentInfoArgs, BalanceArgs, ContractCallArgs, DeployArgs, InvokeArgs, QuoteArgs,
    RegisterAgentArgs, SwapArgs, ToolCall, TransferArgs,
};
use crate::tools::envelope::ToolOutcome;
use crate::tools::schema::{OperationKind, ToolDescriptor, ToolRegistry};

/// Decimals of the native fee token, used to show fee estimates.
const NATIVE_DECIMALS: u8 = 18;
const METADATA_UNAVAILABLE: &str = "ERROR_FETCHING";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    TokenResolved,
    AmountParsed,
    OptionsSelected,
    Submitted,
    AwaitingFinality,
    Completed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Received => "Received",
            Stage::Validated => "Validated",
            Stage::TokenResolved => "TokenResolved",
            Stage::AmountParsed => "AmountParsed",
            Stage::OptionsSelected => "OptionsSelected",
            Stage::Submitted => "Submitted",
            Stage::AwaitingFinality => "AwaitingFinality",
            Stage::Completed => "Completed",
            Stage::Failed => "Failed",
        };
        f.write_str(s)
    }
}

type OpResult = Result<Value, OperationError>;

pub struct Dispatcher {
    tools: ToolRegistry,
    tokens: TokenRegistry,
    ledger: Arc<dyn Ledger>,
    broker: Option<QuoteBroker>,
    identity: Option<IdentityRegistry>,
    has_api_credentials: bool,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(ledger: Arc<dyn Ledger>, tokens: TokenRegistry) -> Self {
        Self {
            tools: ToolRegistry::standard(),
            tokens,
            ledger,
            broker: None,
            identity: None,
            has_api_credentials: false,
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_aggregator(mut self, aggregator: Arc<dyn SwapAggregator>) -> Self {
        self.broker = Some(QuoteBroker::new(aggregator, self.ledger.clone()));
        self
    }

    pub fn with_identity_registry(mut self, address: impl Into<String>) -> Self {
        self.identity = Some(IdentityRegistry::new(self.ledger.clone(), address));
        self
    }

    /// Whether fee-sponsorship credentials are configured.
    pub fn with_api_credentials(mut self, present: bool) -> Self {
        self.has_api_credentials = present;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn list_tools(&self) -> &[ToolDescriptor] {
        self.tools.descriptors()
    }

    pub fn ledger(&self) -> Arc<dyn Ledger> {
        self.ledger.clone()
    }

    fn stage(&self, tool: &str, stage: Stage) {
        debug!("[{}] {}", tool, stage);
    }

    /// Runs one tool invocation. Every failure comes back as a failure
    /// envelope, never as an `Err` or a panic-worthy state.
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolOutcome {
        self.stage(name, Stage::Received);
        match self.run(name, args).await {
            Ok(payload) => {
                self.stage(name, Stage::Completed);
                ToolOutcome::success(name, payload)
            }
            Err(err) => {
                self.stage(name, Stage::Failed);
                let outcome = ToolOutcome::failure(name, &err);
                warn!("Tool {} failed ({:?}): {}", name, outcome.kind(), err);
                outcome
            }
        }
    }

    async fn run(&self, name: &str, args: Value) -> OpResult {
        let descriptor = self
            .tools
            .get(name)
            .ok_or_else(|| OperationError::UnknownTool(name.to_string()))?;
        let normalized = descriptor
            .validate(&args)
            .map_err(OperationError::InvalidArguments)?;
        let call = ToolCall::parse(name, normalized)
            .map_err(|e| OperationError::invalid_arguments(e.to_string()))?;
        self.stage(name, Stage::Validated);
        if descriptor.kind == OperationKind::Write {
            info!("[{}] state-changing call for {}", name, self.ledger.account_address());
        }

        match call {
            ToolCall::GetBalance(a) => self.get_balance(name, a).await,
            ToolCall::Transfer(a) => self.transfer(name, a).await,
            ToolCall::CallContract(a) => self.call_contract(a).await,
            ToolCall::InvokeContract(a) => self.invoke_contract(name, a).await,
            ToolCall::Swap(a) => self.swap(name, a).await,
            ToolCall::GetQuote(a) => self.get_quote(name, a).await,
            ToolCall::EstimateFee(a) => self.estimate_fee(a).await,
            ToolCall::DeployContract(a) => self.deploy_contract(name, a).await,
            ToolCall::RegisterAgent(a) => self.register_agent(name, a).await,
            ToolCall::GetAgentInfo(a) => self.get_agent_info(a).await,
        }
    }

    fn resolve_gas_token(&self, gas_token: Option<&str>) -> Result<Option<String>, OperationError> {
        Ok(match gas_token {
            Some(t) => Some(self.tokens.resolve(t)?),
            None => None,
        })
    }

    fn options(&self, tool: &str, gas_token: Option<&str>) -> ExecutionOptions {
        let options = select_execution_options(self.has_api_credentials, gas_token);
        self.stage(tool, Stage::OptionsSelected);
        options
    }

    /// Submits `calls` as one transaction and blocks until it is final.
    async fn submit_and_wait(
        &self,
        tool: &str,
        calls: &[Call],
        options: &ExecutionOptions,
    ) -> Result<(String, Receipt), OperationError> {
        let hash = self.ledger.execute(calls, options).await?;
        self.stage(tool, Stage::Submitted);
        let receipt = self.await_finality(tool, &hash).await?;
        Ok((hash, receipt))
    }

    async fn await_finality(&self, tool: &str, hash: &str) -> Result<Receipt, OperationError> {
        self.stage(tool, Stage::AwaitingFinality);
        let receipt = wait_for_finality(self.ledger.as_ref(), hash, self.poll_interval).await?;
        info!("[{}] transaction {} is final", tool, hash);
        Ok(receipt)
    }

    fn broker(&self) -> Result<&QuoteBroker, OperationError> {
        self.broker
            .as_ref()
            .ok_or_else(|| OperationError::unconfigured("AGGREGATOR_BASE_URL is not configured"))
    }

    fn identity(&self) -> Result<&IdentityRegistry, OperationError> {
        self.identity
            .as_ref()
            .ok_or_else(|| OperationError::unconfigured("IDENTITY_REGISTRY_ADDRESS is not configured"))
    }

    async fn get_balance(&self, tool: &str, args: BalanceArgs) -> OpResult {
        let token = self.tokens.resolve(&args.token)?;
        self.stage(tool, Stage::TokenResolved);
        let address = args
            .address
            .unwrap_or_else(|| self.ledger.account_address());

        let ledger = self.ledger.as_ref();
        let (raw, decimals) = tokio::try_join!(
            erc20::balance_of(ledger, &token, &address),
            erc20::decimals(ledger, &token)
        )?;

        Ok(json!({
            "address": address,
            "token": args.token,
            "balance": to_human_units(raw, decimals),
            "raw": raw.to_string(),
            "decimals": decimals,
        }))
    }

    async fn transfer(&self, tool: &str, args: TransferArgs) -> OpResult {
        if !is_address_literal(&args.recipient) {
            return Err(OperationError::invalid_arguments(
                "recipient must be a 0x-prefixed address",
            ));
        }
        let token = self.tokens.resolve(&args.token)?;
        let gas_token = self.resolve_gas_token(args.gas_token.as_deref())?;
        self.stage(tool, Stage::TokenResolved);

        let decimals = erc20::decimals(self.ledger.as_ref(), &token).await?;
        let amount = to_base_units(&args.amount, decimals)?;
        self.stage(tool, Stage::AmountParsed);

        let options = self.options(tool, gas_token.as_deref());
        let call = erc20::transfer_call(&token, &args.recipient, amount);
        let (hash, _) = self.submit_and_wait(tool, &[call], &options).await?;

        Ok(json!({
            "success": true,
            "transactionHash": hash,
            "recipient": args.recipient,
            "token": args.token,
            "amount": args.amount,
            "sponsored": options.is_sponsored(),
            "gasless": options.is_gasless(),
        }))
    }

    async fn call_contract(&self, args: ContractCallArgs) -> OpResult {
        let call = Call::new(&args.contract_address, &args.entrypoint).with_calldata(args.calldata);
        let result = self.ledger.call(&call).await?;
        Ok(json!({
            "result": result,
            "contractAddress": args.contract_address,
            "entrypoint": args.entrypoint,
        }))
    }

    async fn invoke_contract(&self, tool: &str, args: InvokeArgs) -> OpResult {
        let gas_token = self.resolve_gas_token(args.gas_token.as_deref())?;
        let options = self.options(tool, gas_token.as_deref());
        let call = Call::new(&args.contract_address, &args.entrypoint).with_calldata(args.calldata);
        let (hash, _) = self.submit_and_wait(tool, &[call], &options).await?;

        Ok(json!({
            "success": true,
            "transactionHash": hash,
            "contractAddress": args.contract_address,
            "entrypoint": args.entrypoint,
            "sponsored": options.is_sponsored(),
            "gasless": options.is_gasless(),
        }))
    }

    /// Resolves both tokens, converts the sell amount and fetches the best
    /// quote. Shared by `get_quote` and `swap`.
    async fn quote_for(
        &self,
        tool: &str,
        sell_token: &str,
        buy_token: &str,
        amount: &str,
    ) -> Result<(Quote, String, QuoteSummary), OperationError> {
        let sell = self.tokens.resolve(sell_token)?;
        let buy = self.tokens.resolve(buy_token)?;
        self.stage(tool, Stage::TokenResolved);
        let broker = self.broker()?;

        let ledger = self.ledger.as_ref();
        let (sell_decimals, buy_decimals) =
            tokio::try_join!(erc20::decimals(ledger, &sell), erc20::decimals(ledger, &buy))?;
        let sell_amount = to_base_units(amount, sell_decimals)?;
        self.stage(tool, Stage::AmountParsed);

        let quote = broker
            .best_quote(&sell, &buy, sell_amount, &self.ledger.account_address())
            .await?;
        let summary = QuoteSummary::new(&quote, buy_decimals);
        Ok((quote, sell, summary))
    }

    async fn get_quote(&self, tool: &str, args: QuoteArgs) -> OpResult {
        let (_, _, summary) = self
            .quote_for(tool, &args.sell_token, &args.buy_token, &args.amount)
            .await?;
        Ok(quote_payload(&args.sell_token, &args.buy_token, &args.amount, &summary))
    }

    async fn swap(&self, tool: &str, args: SwapArgs) -> OpResult {
        if !(args.slippage > 0.0 && args.slippage < 1.0) {
            return Err(OperationError::invalid_arguments(
                "slippage must be between 0 and 1 (exclusive)",
            ));
        }
        let (quote, sell_address, summary) = self
            .quote_for(tool, &args.sell_token, &args.buy_token, &args.amount)
            .await?;

        let gas_token = args.gasless.then_some(sell_address);
        let options = self.options(tool, gas_token.as_deref());

        let hash = self
            .broker()?
            .execute_quote(&quote, args.slippage, &options)
            .await?;
        self.stage(tool, Stage::Submitted);
        self.await_finality(tool, &hash).await?;

        let mut payload = quote_payload(&args.sell_token, &args.buy_token, &args.amount, &summary);
        if let Value::Object(map) = &mut payload {
            map.insert("success".into(), json!(true));
            map.insert("transactionHash".into(), json!(hash));
            map.insert("slippage".into(), json!(args.slippage));
            map.insert("sponsored".into(), json!(options.is_sponsored()));
            map.insert("gasless".into(), json!(options.is_gasless()));
        }
        Ok(payload)
    }

    async fn estimate_fee(&self, args: ContractCallArgs) -> OpResult {
        let call = Call::new(&args.contract_address, &args.entrypoint).with_calldata(args.calldata);
        let fee = self.ledger.estimate_fee(&[call]).await?;
        Ok(json!({
            "overallFee": to_human_units(fee.overall_fee, NATIVE_DECIMALS),
            "gasUnits": fee.gas_units.to_string(),
            "gasPrice": fee.gas_price.to_string(),
            "unit": fee.unit,
        }))
    }

    async fn deploy_contract(&self, tool: &str, args: DeployArgs) -> OpResult {
        if !is_address_literal(&args.bytecode) {
            return Err(OperationError::invalid_arguments(
                "bytecode must be 0x-prefixed hex",
            ));
        }
        let gas_token = self.resolve_gas_token(args.gas_token.as_deref())?;
        let options = self.options(tool, gas_token.as_deref());

        let request = DeployRequest {
            bytecode: args.bytecode,
            constructor_types: args.constructor_types,
            constructor_calldata: args.constructor_calldata,
            salt: args.salt,
        };
        let deployment = self.ledger.deploy(&request, &options).await?;
        self.stage(tool, Stage::Submitted);
        self.await_finality(tool, &deployment.transaction_hash).await?;

        Ok(json!({
            "success": true,
            "transactionHash": deployment.transaction_hash,
            "contractAddress": deployment.contract_address,
            "sponsored": options.is_sponsored(),
            "gasless": options.is_gasless(),
        }))
    }

    async fn register_agent(&self, tool: &str, args: RegisterAgentArgs) -> OpResult {
        let identity = self.identity()?;
        let gas_token = self.resolve_gas_token(args.gas_token.as_deref())?;
        let options = self.options(tool, gas_token.as_deref());

        let call = identity.register_call(&args.token_uri, &args.metadata);
        let (hash, receipt) = self.submit_and_wait(tool, &[call], &options).await?;
        let agent_id = identity.agent_id_from_receipt(&receipt).map(|id| id.to_string());

        Ok(json!({
            "success": true,
            "transactionHash": hash,
            "agentId": agent_id,
            "message": "Agent registered successfully on ERC-8004",
            "sponsored": options.is_sponsored(),
            "gasless": options.is_gasless(),
        }))
    }

    async fn get_agent_info(&self, args: AgentInfoArgs) -> OpResult {
        let identity = self.identity()?;
        let agent_id = U256::from_dec_str(args.agent_id.trim()).map_err(|_| {
            OperationError::invalid_arguments(format!(
                "agentId '{}' is not a decimal id",
                args.agent_id
            ))
        })?;

        if !identity.exists(agent_id).await? {
            return Ok(json!({ "exists": false, "agentId": args.agent_id }));
        }

        let values = join_all(args.keys.iter().map(|k| identity.metadata(agent_id, k))).await;
        let metadata: Map<String, Value> = args
            .keys
            .iter()
            .zip(values)
            .map(|(key, value)| {
                let value = value.unwrap_or_else(|e| {
                    debug!("metadata '{}' unavailable: {}", key, e);
                    METADATA_UNAVAILABLE.to_string()
                });
                (key.clone(), Value::String(value))
            })
            .collect();

        Ok(json!({
            "exists": true,
            "agentId": args.agent_id,
            "metadata": metadata,
        }))
    }
}

fn quote_payload(sell_token: &str, buy_token: &str, amount: &str, summary: &QuoteSummary) -> Value {
    json!({
        "sellToken": sell_token,
        "buyToken": buy_token,
        "sellAmount": amount,
        "buyAmount": summary.buy_amount,
        "sellAmountInUsd": summary.sell_amount_in_usd,
        "buyAmountInUsd": summary.buy_amount_in_usd,
        "priceImpact": summary.price_impact,
        "gasFeesUsd": summary.gas_fees_usd,
        "routes": summary.routes,
        "quoteId": summary.quote_id,
    })
}
