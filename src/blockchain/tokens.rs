// src/blockchain/tokens.rs

use std::collections::BTreeMap;

use thiserror::Error;

/// Prefix every literal on-chain address carries.
pub const ADDRESS_PREFIX: &str = "0x";

/// Well-known ERC-20 tokens on Ethereum mainnet. Native ether is not an
/// ERC-20, so there is no `ETH` entry; callers name `WETH` explicitly.
const MAINNET_TOKENS: &[(&str, &str)] = &[
    ("WETH", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
    ("USDC", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
    ("USDT", "0xdAC17F958D2ee523a2206206994597C13D831ec7"),
    ("DAI", "0x6B175474E89094C44Da98b954EedeAC495271d0F"),
    ("WBTC", "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Unknown token: {reference}. Known symbols: {known}")]
    Unknown { reference: String, known: String },
}

/// Read-only symbol table handed to the dispatcher at construction.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    by_symbol: BTreeMap<String, String>,
}

impl TokenRegistry {
    pub fn new<I, S, A>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, A)>,
        S: AsRef<str>,
        A: Into<String>,
    {
        let by_symbol = entries
            .into_iter()
            .map(|(symbol, address)| (symbol.as_ref().to_ascii_uppercase(), address.into()))
            .collect();
        Self { by_symbol }
    }

    pub fn mainnet() -> Self {
        Self::new(MAINNET_TOKENS.iter().copied())
    }

    /// Resolves a symbol (case-insensitive) or passes a literal address through.
    pub fn resolve(&self, reference: &str) -> Result<String, TokenError> {
        let reference = reference.trim();
        if let Some(address) = self.by_symbol.get(&reference.to_ascii_uppercase()) {
            return Ok(address.clone());
        }
        if reference.starts_with(ADDRESS_PREFIX) {
            return Ok(reference.to_string());
        }
        Err(TokenError::Unknown {
            reference: reference.to_string(),
            known: self.symbols().join(", "),
        })
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.by_symbol.keys().map(String::as_str).collect()
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// True for strings carrying the chain's address prefix.
pub fn is_address_literal(value: &str) -> bool {
    value.starts_with(ADDRESS_PREFIX) && value.len() > ADDRESS_PREFIX.len()
}
