//! Chat completion requests and typed request headers.
//!
//! The gateway speaks the OpenAI-compatible chat completion shape. Only
//! the fields the gateway itself inspects are modeled; everything else
//! rides along in [`ChatRequest::extra`] and is forwarded to the
//! provider untouched.

use serde::{Deserialize, Serialize};

/// One message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// An inbound chat completion request.
///
/// `model: "auto"` (or no model at all) asks the gateway to pick a
/// model from the engagement classification. The payment fields are
/// body-level alternatives to the equivalent headers for clients that
/// cannot set custom headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Routing mode name; unknown values fall back to the default mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Wallet address supplied in the body instead of `X-Wallet-Address`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_wallet_address: Option<String>,
    /// Payment transaction hash supplied in the body instead of `X-Payment-TX`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_payment_tx: Option<String>,
    /// Set on node-to-node forwarded bodies so the receiving gateway
    /// does not bill the request a second time.
    #[serde(rename = "_payment_verified", skip_serializing_if = "Option::is_none")]
    pub payment_verified: Option<bool>,
    /// Provider options the gateway does not interpret (tools, top_p, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatRequest {
    /// Build a minimal request from messages alone.
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// The model the caller explicitly requested, treating `"auto"` as
    /// no request.
    pub fn requested_model(&self) -> Option<&str> {
        match self.model.as_deref() {
            None | Some("auto") => None,
            Some(m) => Some(m),
        }
    }
}

/// Token usage block of a completion response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Extract the usage block from a provider completion, defaulting all
/// counters to zero when the provider omits them.
pub fn completion_usage(completion: &serde_json::Value) -> TokenUsage {
    completion
        .get("usage")
        .and_then(|u| serde_json::from_value(u.clone()).ok())
        .unwrap_or_default()
}

/// The model name a provider completion reports, if any.
pub fn completion_model(completion: &serde_json::Value) -> Option<&str> {
    completion.get("model").and_then(|m| m.as_str())
}

/// Request headers the gateway inspects, already plucked out of the
/// transport layer.
///
/// All fields hold raw header values; parsing and validation happen in
/// the subsystems that consume them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    /// `Authorization` bearer value (API key or session token).
    pub authorization: Option<String>,
    /// `X-Wallet-Address`.
    pub wallet_address: Option<String>,
    /// `X-Payer-Address`, an alias some clients send instead.
    pub payer_address: Option<String>,
    /// `X-Payment-TX`, a Base transaction hash paying for this request.
    pub payment_tx: Option<String>,
    /// `PAYMENT-SIGNATURE`, the x402 payment payload.
    pub payment_signature: Option<String>,
    /// `X-PAYMENT`, older alias for the x402 payload.
    pub x_payment: Option<String>,
    /// `X-Priority` engagement hint.
    pub priority: Option<String>,
    /// `Cache-Control`.
    pub cache_control: Option<String>,
    /// `X-Proxied-From`, the node id of a forwarding gateway.
    pub proxied_from: Option<String>,
    /// `X-Payment-Verified`, set to `"true"` on forwarded requests.
    pub payment_verified: Option<String>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    pub fn with_wallet_address(mut self, value: impl Into<String>) -> Self {
        self.wallet_address = Some(value.into());
        self
    }

    pub fn with_payment_tx(mut self, value: impl Into<String>) -> Self {
        self.payment_tx = Some(value.into());
        self
    }

    pub fn with_payment_signature(mut self, value: impl Into<String>) -> Self {
        self.payment_signature = Some(value.into());
        self
    }

    pub fn with_priority(mut self, value: impl Into<String>) -> Self {
        self.priority = Some(value.into());
        self
    }

    pub fn with_cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    pub fn with_proxy_marker(mut self, from_node: impl Into<String>) -> Self {
        self.proxied_from = Some(from_node.into());
        self.payment_verified = Some("true".to_string());
        self
    }

    /// The x402 payment payload, whichever header carried it.
    pub fn x402_payload(&self) -> Option<&str> {
        self.payment_signature
            .as_deref()
            .or(self.x_payment.as_deref())
    }
}
