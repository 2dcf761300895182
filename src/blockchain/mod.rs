// src/blockchain/mod.rs

pub mod abi;
pub mod aggregator;
pub mod amount;
pub mod erc20;
pub mod evm_client;
pub mod identity;
pub mod ledger;
pub mod models;
pub mod nonce_manager;
pub mod paymaster;
pub mod quotes;
pub mod tokens;

pub use evm_client::EvmLedger;
pub use ledger::Ledger;
