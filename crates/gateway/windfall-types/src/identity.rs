//! Caller identity, identity tiers, and agent sessions.
//!
//! A request can arrive with an API key, a session token, a bare
//! wallet address, or nothing at all. Identity resolution happens in
//! the payment crate; this module defines what it resolves to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of every issued API key.
pub const API_KEY_PREFIX: &str = "wf_";

/// Onchain identity class attached to an API key. Stronger identities
/// earn a larger free-request grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityTier {
    /// No onchain identity.
    #[default]
    Anonymous,
    /// Controls a wallet address.
    Wallet,
    /// Wallet with a Basename.
    Basename,
    /// Registered ERC-8004 agent identity.
    Erc8004,
}

impl IdentityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityTier::Anonymous => "anonymous",
            IdentityTier::Wallet => "wallet",
            IdentityTier::Basename => "basename",
            IdentityTier::Erc8004 => "erc8004",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "anonymous" => Some(IdentityTier::Anonymous),
            "wallet" => Some(IdentityTier::Wallet),
            "basename" => Some(IdentityTier::Basename),
            "erc8004" => Some(IdentityTier::Erc8004),
            _ => None,
        }
    }

    /// Free requests granted to a newly created key of this tier.
    pub fn free_requests(&self) -> u32 {
        match self {
            IdentityTier::Anonymous => 25,
            IdentityTier::Wallet => 50,
            IdentityTier::Basename => 75,
            IdentityTier::Erc8004 => 100,
        }
    }
}

impl fmt::Display for IdentityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a wallet session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Plain SIWE wallet session.
    Wallet,
    /// ERC-8004 registered agent session.
    Erc8004,
}

impl SessionKind {
    /// Label used in client-facing payment messages.
    pub fn label(&self) -> &'static str {
        match self {
            SessionKind::Wallet => "wallet",
            SessionKind::Erc8004 => "ERC-8004",
        }
    }
}

/// An authenticated session resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSession {
    /// Lowercased wallet address the session is bound to.
    pub wallet_address: String,
    pub kind: SessionKind,
}

/// A fully resolved caller identity for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum CallerIdentity {
    /// Valid `wf_` API key.
    ApiKey {
        key_id: i64,
        /// Wallet the key was registered with, if any.
        wallet_address: Option<String>,
    },
    /// Valid session token.
    Session(AgentSession),
    /// Bare wallet address from headers or body, no authentication.
    Wallet(String),
    /// No usable credential.
    Anonymous,
}

impl CallerIdentity {
    /// The wallet address attached to this identity, if any.
    pub fn wallet_address(&self) -> Option<&str> {
        match self {
            CallerIdentity::ApiKey { wallet_address, .. } => wallet_address.as_deref(),
            CallerIdentity::Session(session) => Some(&session.wallet_address),
            CallerIdentity::Wallet(addr) => Some(addr),
            CallerIdentity::Anonymous => None,
        }
    }

    /// Stable key for engagement history tracking. Falls back to the
    /// request id so anonymous one-shot callers still classify.
    pub fn engagement_key(&self, request_id: &str) -> String {
        match self {
            CallerIdentity::ApiKey { key_id, .. } => key_id.to_string(),
            CallerIdentity::Session(session) => session.wallet_address.clone(),
            CallerIdentity::Wallet(addr) => addr.clone(),
            CallerIdentity::Anonymous => request_id.to_string(),
        }
    }

    /// Cache isolation scope. Different callers must never share cache
    /// entries, so the scope folds the strongest identity component
    /// into the cache key.
    pub fn cache_scope(&self, request_id: &str) -> String {
        match self {
            CallerIdentity::ApiKey { key_id, .. } => format!("key:{key_id}"),
            CallerIdentity::Session(session) => format!("wallet:{}", session.wallet_address),
            CallerIdentity::Wallet(addr) => format!("wallet:{addr}"),
            CallerIdentity::Anonymous => format!("anon:{request_id}"),
        }
    }
}

/// Validate and normalize an EVM wallet address: `0x` plus 40 hex
/// characters, lowercased. Returns `None` for anything else.
pub fn normalize_wallet(address: &str) -> Option<String> {
    let hex_part = address.strip_prefix("0x").or_else(|| address.strip_prefix("0X"))?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(address.to_lowercase())
}
