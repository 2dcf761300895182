// src/config.rs

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;
use validator::{Validate, ValidationError};

use crate::blockchain::tokens::{TokenRegistry, ADDRESS_PREFIX};

/// Deterministic CREATE2 deployer present on most EVM networks.
pub const DEFAULT_DEPLOYER_ADDRESS: &str = "0x4e59b44847b379578588920cA78FbF26c0B4956C";

fn validate_address(value: &str) -> Result<(), ValidationError> {
    if value.starts_with(ADDRESS_PREFIX) && value.len() > ADDRESS_PREFIX.len() {
        Ok(())
    } else {
        Err(ValidationError::new("address_prefix"))
    }
}

// Loaded once at startup and shared read-only afterwards.
#[derive(Clone, Debug, Validate)]
pub struct Config {
    // Ledger
    #[validate(url)]
    pub rpc_url: String,
    #[validate(custom = "validate_address")]
    pub account_address: String,
    pub private_key: SecretString,
    #[validate(custom = "validate_address")]
    pub deployer_address: String,
    #[validate(range(min = 1))]
    pub finality_poll_interval_ms: u64,

    // Agent registries
    #[validate(custom = "validate_address")]
    pub identity_registry_address: Option<String>,
    #[validate(custom = "validate_address")]
    pub reputation_registry_address: Option<String>,
    #[validate(custom = "validate_address")]
    pub validation_registry_address: Option<String>,
    pub a2a_agent_id: Option<String>,

    // Swaps and fee sponsorship
    #[validate(url)]
    pub aggregator_base_url: Option<String>,
    pub aggregator_api_key: Option<SecretString>,
    #[validate(url)]
    pub paymaster_url: Option<String>,
    pub tokens: TokenRegistry,

    // Server
    pub port: u16,
    #[validate(url)]
    pub public_base_url: String,
    pub mcp_mode: bool,
}

impl Config {
    /// Loads configuration from environment variables (and `.env`).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds and validates a config from any key lookup. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).with_context(|| format!("{} must be set", key));

        let port = match get("PORT") {
            Some(p) => p.parse().context("PORT must be a valid port number")?,
            None => 8080,
        };

        let finality_poll_interval_ms = match get("FINALITY_POLL_INTERVAL_MS") {
            Some(v) => v
                .parse()
                .context("FINALITY_POLL_INTERVAL_MS must be a positive integer")?,
            None => 2000,
        };

        let tokens = match get("TOKEN_REGISTRY") {
            Some(raw) => {
                let table: BTreeMap<String, String> = serde_json::from_str(&raw)
                    .context("TOKEN_REGISTRY must be a JSON object of symbol -> address")?;
                for (symbol, address) in &table {
                    validate_address(address).map_err(|_| {
                        anyhow::anyhow!("TOKEN_REGISTRY entry {} has a malformed address", symbol)
                    })?;
                }
                TokenRegistry::new(table)
            }
            None => TokenRegistry::mainnet(),
        };

        if let Some(id) = get("A2A_AGENT_ID") {
            id.parse::<u128>()
                .context("A2A_AGENT_ID must be a decimal agent id")?;
        }

        let config = Config {
            rpc_url: require("RPC_URL")?,
            account_address: require("ACCOUNT_ADDRESS")?,
            private_key: SecretString::new(require("PRIVATE_KEY")?),
            deployer_address: get("DEPLOYER_ADDRESS")
                .unwrap_or_else(|| DEFAULT_DEPLOYER_ADDRESS.to_string()),
            finality_poll_interval_ms,
            identity_registry_address: get("IDENTITY_REGISTRY_ADDRESS"),
            reputation_registry_address: get("REPUTATION_REGISTRY_ADDRESS"),
            validation_registry_address: get("VALIDATION_REGISTRY_ADDRESS"),
            a2a_agent_id: get("A2A_AGENT_ID"),
            aggregator_base_url: get("AGGREGATOR_BASE_URL"),
            aggregator_api_key: get("AGGREGATOR_API_KEY").map(SecretString::new),
            paymaster_url: get("PAYMASTER_URL"),
            tokens,
            port,
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://127.0.0.1:{}", port)),
            mcp_mode: matches!(get("MCP_MODE").as_deref(), Some("1" | "true" | "stdio")),
        };

        if !get("PRIVATE_KEY")
            .map(|k| k.starts_with(ADDRESS_PREFIX))
            .unwrap_or(false)
        {
            anyhow::bail!("PRIVATE_KEY must be 0x-prefixed hex");
        }

        if config.has_api_credentials() && config.paymaster_url.is_none() {
            anyhow::bail!(
                "PAYMASTER_URL must be set when AGGREGATOR_API_KEY enables fee sponsorship"
            );
        }

        config
            .validate()
            .context("invalid configuration")?;
        Ok(config)
    }

    pub fn finality_poll_interval(&self) -> Duration {
        Duration::from_millis(self.finality_poll_interval_ms)
    }

    /// Sponsorship is available whenever API credentials are configured.
    pub fn has_api_credentials(&self) -> bool {
        self.aggregator_api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("RPC_URL", "http://localhost:8545"),
        ("ACCOUNT_ADDRESS", "0x000000000000000000000000000000000000dEaD"),
        (
            "PRIVATE_KEY",
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
        ),
    ];

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.finality_poll_interval_ms, 2000);
        assert_eq!(config.public_base_url, "http://127.0.0.1:8080");
        assert_eq!(config.deployer_address, DEFAULT_DEPLOYER_ADDRESS);
        assert!(config.aggregator_base_url.is_none());
        assert!(!config.has_api_credentials());
        assert!(!config.mcp_mode);
        assert!(config.tokens.resolve("USDC").is_ok());
    }

    #[test]
    fn missing_required_field_fails_fast() {
        let err = Config::from_lookup(lookup(&BASE[..2])).unwrap_err();
        assert!(err.to_string().contains("PRIVATE_KEY"));
    }

    #[test]
    fn malformed_url_is_rejected() {
        let mut pairs = BASE.to_vec();
        pairs[0] = ("RPC_URL", "not a url");
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn unprefixed_address_is_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("IDENTITY_REGISTRY_ADDRESS", "1234"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn custom_token_table_replaces_default() {
        let mut pairs = BASE.to_vec();
        pairs.push(("TOKEN_REGISTRY", r#"{"tst": "0x01"}"#));
        pairs.push(("AGGREGATOR_API_KEY", "key"));
        pairs.push(("PAYMASTER_URL", "https://paymaster.example.com"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.tokens.resolve("TST").unwrap(), "0x01");
        assert!(config.tokens.resolve("USDC").is_err());
        assert!(config.has_api_credentials());
    }

    #[test]
    fn sponsorship_without_paymaster_fails_fast() {
        let mut pairs = BASE.to_vec();
        pairs.push(("AGGREGATOR_API_KEY", "key"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("PAYMASTER_URL"));
    }
}
