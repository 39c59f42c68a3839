//! Stable error codes for the gateway.
//!
//! Every failure surfaced by the pipeline maps to one of these codes so
//! that operators and clients can branch on a number instead of parsing
//! message text. Codes are grouped by subsystem:
//!
//! - `0x1000`: request validation
//! - `0x2000`: payment and quota
//! - `0x3000`: energy oracle and routing
//! - `0x4000`: storage
//! - `0x5000`: upstream services (provider, RPC, price feed, peers)
//! - `0x6000`: internal

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error code carried in logs and error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
#[non_exhaustive]
pub enum ErrorCode {
    // ===== Request validation (0x1000) =====
    /// Request body failed validation.
    InvalidRequest = 0x1000,
    /// The messages array was missing or empty.
    EmptyMessages = 0x1001,
    /// A wallet address did not match the expected format.
    InvalidAddress = 0x1002,

    // ===== Payment and quota (0x2000) =====
    /// No payment method could be resolved for the request.
    PaymentRequired = 0x2000,
    /// The caller's free tier is exhausted.
    FreeTierExhausted = 0x2001,
    /// API key balance is below the request cost.
    InsufficientBalance = 0x2002,
    /// The referenced transaction does not exist onchain.
    TxNotFound = 0x2003,
    /// The referenced transaction reverted.
    TxFailed = 0x2004,
    /// A transfer was found but its value is below the tolerated minimum.
    TxAmountTooLow = 0x2005,
    /// The transaction hash has already paid for a request.
    TxAlreadyUsed = 0x2006,
    /// The x402 payment could not be verified or settled.
    X402Failed = 0x2007,
    /// The API key does not exist or was revoked.
    KeyNotFound = 0x2008,

    // ===== Oracle and routing (0x3000) =====
    /// The energy market source is unreachable.
    MarketUnavailable = 0x3000,
    /// The cost surface has not been refreshed within its freshness window.
    SurfaceStale = 0x3001,

    // ===== Storage (0x4000) =====
    /// A database operation failed.
    StorageFailed = 0x4000,

    // ===== Upstream services (0x5000) =====
    /// The inference provider returned an error.
    ProviderFailed = 0x5000,
    /// Forwarding to a peer node failed.
    ProxyFailed = 0x5001,
    /// The chain RPC endpoint is unreachable or returned garbage.
    RpcUnavailable = 0x5002,
    /// The ETH/USD price feed is unreachable.
    PriceFeedUnavailable = 0x5003,

    // ===== Internal (0x6000) =====
    /// Unclassified internal failure.
    Internal = 0x6000,
}

impl ErrorCode {
    /// Numeric value of the code.
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Subsystem that produced the code.
    pub fn category(&self) -> &'static str {
        match self.code() & 0xF000 {
            0x1000 => "request",
            0x2000 => "payment",
            0x3000 => "oracle",
            0x4000 => "storage",
            0x5000 => "upstream",
            _ => "internal",
        }
    }

    /// Whether the code represents a payment or quota failure.
    pub fn is_payment_error(&self) -> bool {
        self.code() & 0xF000 == 0x2000
    }

    /// Whether retrying the same request later could succeed without
    /// the caller changing anything.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::MarketUnavailable
                | ErrorCode::SurfaceStale
                | ErrorCode::ProviderFailed
                | ErrorCode::ProxyFailed
                | ErrorCode::RpcUnavailable
                | ErrorCode::PriceFeedUnavailable
        )
    }

    /// Human-readable hint for resolving the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ErrorCode::EmptyMessages => Some("include at least one message in the request body"),
            ErrorCode::InvalidAddress => Some("wallet addresses are 0x followed by 40 hex characters"),
            ErrorCode::PaymentRequired => {
                Some("pay via x402, a Base transaction hash, or an API key with balance")
            }
            ErrorCode::FreeTierExhausted => Some("top up a balance or pay per request"),
            ErrorCode::InsufficientBalance => Some("add funds to the API key balance"),
            ErrorCode::TxAlreadyUsed => Some("each transaction hash pays for exactly one request"),
            ErrorCode::TxAmountTooLow => Some("send at least the quoted request price"),
            ErrorCode::ProviderFailed | ErrorCode::ProxyFailed => Some("retry the request"),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::EmptyMessages => "EMPTY_MESSAGES",
            ErrorCode::InvalidAddress => "INVALID_ADDRESS",
            ErrorCode::PaymentRequired => "PAYMENT_REQUIRED",
            ErrorCode::FreeTierExhausted => "FREE_TIER_EXHAUSTED",
            ErrorCode::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorCode::TxNotFound => "TX_NOT_FOUND",
            ErrorCode::TxFailed => "TX_FAILED",
            ErrorCode::TxAmountTooLow => "TX_AMOUNT_TOO_LOW",
            ErrorCode::TxAlreadyUsed => "TX_ALREADY_USED",
            ErrorCode::X402Failed => "X402_FAILED",
            ErrorCode::KeyNotFound => "KEY_NOT_FOUND",
            ErrorCode::MarketUnavailable => "MARKET_UNAVAILABLE",
            ErrorCode::SurfaceStale => "SURFACE_STALE",
            ErrorCode::StorageFailed => "STORAGE_FAILED",
            ErrorCode::ProviderFailed => "PROVIDER_FAILED",
            ErrorCode::ProxyFailed => "PROXY_FAILED",
            ErrorCode::RpcUnavailable => "RPC_UNAVAILABLE",
            ErrorCode::PriceFeedUnavailable => "PRICE_FEED_UNAVAILABLE",
            ErrorCode::Internal => "INTERNAL",
        };
        write!(f, "{} (0x{:04X})", name, self.code())
    }
}
