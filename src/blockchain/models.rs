// src/blockchain/models.rs
use ethers_core::types::U256;
use serde::{Deserialize, Serialize};

use crate::blockchain::amount::to_human_units;

// --- Quote Models ---

/// Request sent to the swap aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub sell_token_address: String,
    pub buy_token_address: String,
    pub sell_amount: U256,
    pub taker_address: String,
}

/// A priced offer from the aggregator. Amounts are base units; expiry is
/// tracked upstream only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub quote_id: String,
    pub sell_token_address: String,
    pub buy_token_address: String,
    pub sell_amount: U256,
    pub buy_amount: U256,
    #[serde(default)]
    pub sell_amount_in_usd: Option<f64>,
    #[serde(default)]
    pub buy_amount_in_usd: Option<f64>,
    /// Basis points.
    #[serde(default)]
    pub price_impact: Option<f64>,
    #[serde(default)]
    pub gas_fees: Option<U256>,
    #[serde(default)]
    pub gas_fees_in_usd: Option<f64>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub fee: Option<QuoteFee>,
}

/// One venue's share of the swap volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    /// Fraction of volume in [0, 1].
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteFee {
    pub fee_token: String,
    #[serde(default)]
    pub avnu_fees: Option<U256>,
    #[serde(default)]
    pub avnu_fees_in_usd: Option<f64>,
    #[serde(default)]
    pub avnu_fees_bps: Option<U256>,
    #[serde(default)]
    pub integrator_fees: Option<U256>,
    #[serde(default)]
    pub integrator_fees_in_usd: Option<f64>,
    #[serde(default)]
    pub integrator_fees_bps: Option<U256>,
}

/// Route share as shown to callers, e.g. `{"name": "Ekubo", "percent": "80.0%"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub name: String,
    pub percent: String,
}

/// Caller-facing view of a quote with amounts in human units.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummary {
    pub buy_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell_amount_in_usd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_amount_in_usd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_impact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_fees_usd: Option<String>,
    pub routes: Vec<RouteSummary>,
    pub quote_id: String,
}

impl QuoteSummary {
    pub fn new(quote: &Quote, buy_decimals: u8) -> Self {
        Self {
            buy_amount: to_human_units(quote.buy_amount, buy_decimals),
            sell_amount_in_usd: quote.sell_amount_in_usd.map(|v| format!("{:.2}", v)),
            buy_amount_in_usd: quote.buy_amount_in_usd.map(|v| format!("{:.2}", v)),
            price_impact: quote
                .price_impact
                .filter(|bps| *bps != 0.0)
                .map(|bps| format!("{:.2}%", bps / 100.0)),
            gas_fees_usd: quote.gas_fees_in_usd.map(|v| format!("{:.4}", v)),
            routes: quote
                .routes
                .iter()
                .map(|r| RouteSummary {
                    name: r.name.clone(),
                    percent: format!("{:.1}%", r.percent * 100.0),
                })
                .collect(),
            quote_id: quote.quote_id.clone(),
        }
    }
}
