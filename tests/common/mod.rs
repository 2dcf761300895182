//! Scriptable collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chain_agent_mcp::blockchain::aggregator::{AggregatorError, SwapAggregator};
use chain_agent_mcp::blockchain::ledger::{
    Call, DeployRequest, Deployment, Event, FeeEstimate, Ledger, LedgerError, Receipt,
    TransactionStatus,
};
use chain_agent_mcp::blockchain::models::{Quote, QuoteRequest, Route};
use chain_agent_mcp::blockchain::paymaster::ExecutionOptions;
use chain_agent_mcp::blockchain::tokens::TokenRegistry;
use chain_agent_mcp::tools::Dispatcher;
use ethers_core::types::U256;

pub const ACCOUNT: &str = "0x00000000000000000000000000000000000000aa";
pub const ETH: &str = "0x00000000000000000000000000000000000000e1";
pub const USDC: &str = "0x00000000000000000000000000000000000000c1";
pub const TX_HASH: &str = "0xfeed";
pub const IDENTITY: &str = "0x00000000000000000000000000000000000000d1";

pub fn tokens() -> TokenRegistry {
    TokenRegistry::new([("ETH", ETH), ("USDC", USDC)])
}

pub fn receipt(events: Vec<Event>) -> Receipt {
    Receipt {
        transaction_hash: TX_HASH.into(),
        block_number: Some(100),
        contract_address: None,
        events,
    }
}

pub fn succeeded() -> TransactionStatus {
    TransactionStatus::Succeeded(receipt(vec![]))
}

/// Ledger whose reads are table lookups and whose status reads follow a
/// script. The last scripted status repeats once the script runs out.
pub struct StubLedger {
    decimals: HashMap<String, u8>,
    balances: HashMap<String, U256>,
    metadata: HashMap<String, String>,
    agent_exists: bool,
    single_call_only: bool,
    statuses: Mutex<VecDeque<TransactionStatus>>,
    pub status_reads: AtomicUsize,
    pub executed: Mutex<Vec<(Vec<Call>, ExecutionOptions)>>,
    pub deployed: Mutex<Vec<DeployRequest>>,
}

impl StubLedger {
    pub fn new() -> Self {
        Self {
            decimals: HashMap::from([(ETH.to_string(), 18), (USDC.to_string(), 6)]),
            balances: HashMap::new(),
            metadata: HashMap::new(),
            agent_exists: false,
            single_call_only: false,
            statuses: Mutex::new(VecDeque::from([succeeded()])),
            status_reads: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
            deployed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_statuses(self, statuses: Vec<TransactionStatus>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    /// Behaves like a plain account: multi-call transactions are refused.
    pub fn without_batching(mut self) -> Self {
        self.single_call_only = true;
        self
    }

    pub fn with_balance(mut self, token: &str, raw: u64) -> Self {
        self.balances.insert(token.to_string(), U256::from(raw));
        self
    }

    pub fn with_agent(mut self, metadata: &[(&str, &str)]) -> Self {
        self.agent_exists = true;
        self.metadata = metadata
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    pub fn status_reads(&self) -> usize {
        self.status_reads.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<(Vec<Call>, ExecutionOptions)> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Ledger for StubLedger {
    fn account_address(&self) -> String {
        ACCOUNT.to_string()
    }

    async fn call(&self, call: &Call) -> Result<Vec<String>, LedgerError> {
        let name = call.entrypoint.split('(').next().unwrap_or_default();
        let out = match name {
            "decimals" => self
                .decimals
                .get(&call.contract_address)
                .map(|d| d.to_string())
                .ok_or_else(|| LedgerError::Rpc("execution reverted".into()))?,
            "balanceOf" => self
                .balances
                .get(&call.contract_address)
                .copied()
                .unwrap_or_default()
                .to_string(),
            "agent_exists" => self.agent_exists.to_string(),
            "get_metadata" => {
                let key = call.calldata[1].as_str().unwrap_or_default();
                self.metadata
                    .get(key)
                    .cloned()
                    .ok_or_else(|| LedgerError::Rpc(format!("no metadata for {}", key)))?
            }
            _ => "42".to_string(),
        };
        Ok(vec![out])
    }

    async fn execute(
        &self,
        calls: &[Call],
        options: &ExecutionOptions,
    ) -> Result<String, LedgerError> {
        if self.single_call_only && calls.len() > 1 {
            return Err(LedgerError::BatchUnsupported(calls.len()));
        }
        self.executed
            .lock()
            .unwrap()
            .push((calls.to_vec(), options.clone()));
        Ok(TX_HASH.to_string())
    }

    async fn transaction_status(&self, _hash: &str) -> Result<TransactionStatus, LedgerError> {
        self.status_reads.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        Ok(status.unwrap_or(TransactionStatus::Pending))
    }

    async fn estimate_fee(&self, _calls: &[Call]) -> Result<FeeEstimate, LedgerError> {
        Ok(FeeEstimate {
            overall_fee: U256::from(21_000u64) * U256::from(1_000_000_000u64),
            gas_units: U256::from(21_000u64),
            gas_price: U256::from(1_000_000_000u64),
            unit: "ETH".into(),
        })
    }

    async fn deploy(
        &self,
        request: &DeployRequest,
        _options: &ExecutionOptions,
    ) -> Result<Deployment, LedgerError> {
        self.deployed.lock().unwrap().push(request.clone());
        Ok(Deployment {
            transaction_hash: TX_HASH.into(),
            contract_address: "0x00000000000000000000000000000000000000f0".into(),
        })
    }
}

pub fn quote() -> Quote {
    Quote {
        quote_id: "q-1".into(),
        sell_token_address: ETH.into(),
        buy_token_address: USDC.into(),
        sell_amount: U256::exp10(18),
        buy_amount: U256::from(3_000_500_000u64),
        sell_amount_in_usd: Some(3001.456),
        buy_amount_in_usd: Some(3000.5),
        price_impact: Some(12.0),
        gas_fees: None,
        gas_fees_in_usd: Some(0.12345),
        routes: vec![Route {
            name: "Uniswap".into(),
            address: None,
            percent: 1.0,
        }],
        fee: None,
    }
}

/// Aggregator answering every request with the same quotes.
pub struct StubAggregator {
    quotes: Vec<Quote>,
    build_error: Option<AggregatorError>,
    pub requests: Mutex<Vec<QuoteRequest>>,
}

impl StubAggregator {
    pub fn new(quotes: Vec<Quote>) -> Self {
        Self {
            quotes,
            build_error: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_build(mut self, err: AggregatorError) -> Self {
        self.build_error = Some(err);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SwapAggregator for StubAggregator {
    async fn quotes(&self, request: &QuoteRequest) -> Result<Vec<Quote>, AggregatorError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.quotes.clone())
    }

    async fn build_swap(
        &self,
        quote: &Quote,
        _taker_address: &str,
        _slippage: f64,
    ) -> Result<Vec<Call>, AggregatorError> {
        if let Some(err) = &self.build_error {
            return Err(err.clone());
        }
        Ok(vec![
            Call::new(&quote.sell_token_address, "approve(address,uint256)"),
            Call::new("0x00000000000000000000000000000000000000ee", "swap(bytes)"),
        ])
    }
}

pub fn dispatcher(ledger: Arc<StubLedger>) -> Dispatcher {
    Dispatcher::new(ledger, tokens()).with_poll_interval(Duration::from_millis(1))
}
