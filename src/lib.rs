// src/lib.rs

use std::sync::Arc;

pub mod a2a;
pub mod api;
pub mod blockchain;
pub mod config;
pub mod errors;
pub mod mcp;
pub mod tools;

use crate::a2a::A2aAdapter;
use crate::blockchain::aggregator::SwapAggregator;
use crate::blockchain::ledger::Ledger;
use crate::config::Config;
use crate::tools::Dispatcher;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Runs tool invocations for both transports
    pub dispatcher: Arc<Dispatcher>,
    /// Present when an identity registry is configured
    pub a2a: Option<Arc<A2aAdapter>>,
}

impl AppState {
    /// Wires the dispatcher and A2A adapter from configuration. The ledger and
    /// aggregator are passed in so tests can substitute their own.
    pub fn new(
        config: Config,
        ledger: Arc<dyn Ledger>,
        aggregator: Option<Arc<dyn SwapAggregator>>,
    ) -> Self {
        let mut dispatcher = Dispatcher::new(ledger.clone(), config.tokens.clone())
            .with_api_credentials(config.has_api_credentials())
            .with_poll_interval(config.finality_poll_interval());
        if let Some(aggregator) = aggregator {
            dispatcher = dispatcher.with_aggregator(aggregator);
        }
        if let Some(registry) = &config.identity_registry_address {
            dispatcher = dispatcher.with_identity_registry(registry.clone());
        }

        let a2a = A2aAdapter::from_config(&config, ledger).map(Arc::new);

        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            a2a,
        }
    }
}
