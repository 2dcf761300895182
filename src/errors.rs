//! Error taxonomy shared by every tool.
//!
//! Collaborators (ledger, aggregator, codec, resolver) report their own
//! structured errors. [`OperationError`] wraps them and [`normalize`] is the
//! only place they are mapped onto the user-facing [`ErrorKind`] set.

use serde::Serialize;
use thiserror::Error;

use crate::blockchain::{
    aggregator::AggregatorError, amount::AmountError, ledger::LedgerError, tokens::TokenError,
};

/// User-facing error categories. Callers pattern-match on these instead of
/// parsing free text from upstream services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    UnknownTool,
    InvalidArguments,
    UnknownToken,
    InvalidAmount,
    NoLiquidity,
    SlippageExceeded,
    QuoteExpired,
    InsufficientBalance,
    LedgerRejected,
    Unconfigured,
}

impl ErrorKind {
    /// Stable message shown to callers for this category.
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::UnknownTool => "Unknown tool. Call tools/list to see the available tools.",
            ErrorKind::InvalidArguments => "Invalid or missing tool arguments.",
            ErrorKind::UnknownToken => {
                "Unknown token. Use a registered symbol or a 0x-prefixed contract address."
            }
            ErrorKind::InvalidAmount => {
                "Invalid amount. Use a non-negative decimal number such as '1.5'."
            }
            ErrorKind::NoLiquidity => {
                "No swap routes available for this token pair. The pair may not have liquidity."
            }
            ErrorKind::SlippageExceeded => "Slippage exceeded. Try increasing slippage tolerance.",
            ErrorKind::QuoteExpired => "Quote expired. Please retry the operation.",
            ErrorKind::InsufficientBalance => "Insufficient token balance for this operation.",
            ErrorKind::LedgerRejected => "The transaction was rejected by the network.",
            ErrorKind::Unconfigured => {
                "A required service address or credential is not configured on the server."
            }
        }
    }
}

/// Any failure raised while a tool invocation is being handled.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("{0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Unconfigured(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Aggregator(#[from] AggregatorError),
}

impl OperationError {
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        OperationError::InvalidArguments(message.into())
    }

    pub fn unconfigured(message: impl Into<String>) -> Self {
        OperationError::Unconfigured(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        normalize(self)
    }
}

/// Maps a failure onto the user-facing taxonomy.
pub fn normalize(err: &OperationError) -> ErrorKind {
    match err {
        OperationError::UnknownTool(_) => ErrorKind::UnknownTool,
        OperationError::InvalidArguments(_) => ErrorKind::InvalidArguments,
        OperationError::Unconfigured(_) => ErrorKind::Unconfigured,
        OperationError::Token(_) => ErrorKind::UnknownToken,
        OperationError::Amount(_) => ErrorKind::InvalidAmount,
        OperationError::Ledger(e) => match e {
            LedgerError::InvalidCall(_) => ErrorKind::InvalidArguments,
            LedgerError::BatchUnsupported(_) | LedgerError::PaymasterUnconfigured => {
                ErrorKind::Unconfigured
            }
            LedgerError::Reverted { reason, .. } | LedgerError::Rejected { reason, .. } => {
                classify_message(reason).unwrap_or(ErrorKind::LedgerRejected)
            }
            LedgerError::Rpc(message) | LedgerError::Paymaster(message) => {
                classify_message(message).unwrap_or(ErrorKind::LedgerRejected)
            }
        },
        OperationError::Aggregator(e) => match e {
            AggregatorError::NoQuotes | AggregatorError::InsufficientLiquidity(_) => {
                ErrorKind::NoLiquidity
            }
            AggregatorError::QuoteExpired(_) => ErrorKind::QuoteExpired,
            AggregatorError::SlippageExceeded(_) => ErrorKind::SlippageExceeded,
            AggregatorError::Upstream { message, .. } => {
                classify_message(message).unwrap_or(ErrorKind::LedgerRejected)
            }
            AggregatorError::Transport(_) | AggregatorError::Decode(_) => ErrorKind::LedgerRejected,
        },
    }
}

/// Best-effort classification of free text coming from parties we do not
/// control (revert reasons, node RPC errors, aggregator and paymaster bodies).
///
/// This is substring matching and will drift if upstream wording changes. Keep
/// every such match in this function.
pub fn classify_message(message: &str) -> Option<ErrorKind> {
    let m = message.to_lowercase();
    if m.contains("insufficient_liquidity") || m.contains("insufficient liquidity") {
        Some(ErrorKind::NoLiquidity)
    } else if m.contains("slippage") || m.contains("insufficient tokens received") {
        Some(ErrorKind::SlippageExceeded)
    } else if m.contains("quote_expired") || m.contains("quote expired") {
        Some(ErrorKind::QuoteExpired)
    } else if m.contains("insufficient_balance")
        || m.contains("insufficient balance")
        || m.contains("exceeds balance")
        || m.contains("insufficient funds")
    {
        Some(ErrorKind::InsufficientBalance)
    } else if m.contains("no quotes available") {
        Some(ErrorKind::NoLiquidity)
    } else {
        None
    }
}
