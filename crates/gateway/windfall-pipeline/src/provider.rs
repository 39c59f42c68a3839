//! External inference provider.
//!
//! The gateway itself runs no models; completions come from an
//! OpenAI-compatible aggregator behind the [`InferenceProvider`] trait.
//! The production implementation is [`OpenRouterProvider`]; tests swap
//! in an in-process fake.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use windfall_types::ChatMessage;

/// Default completions endpoint.
pub const DEFAULT_PROVIDER_URL: &str = "https://openrouter.ai/api/v1";

/// Generation can legitimately take a while on large prompts.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// One completion request, already resolved to a concrete model and a
/// capped token budget.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionCall {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// A completion plus how long the provider took to produce it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    /// The provider's response body, passed through untouched.
    pub completion: Value,
    pub latency_ms: u64,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider could not be reached.
    #[error("provider transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {detail}")]
    Upstream { status: u16, detail: String },

    /// The provider answered 2xx but the body was not valid JSON.
    #[error("provider response unreadable: {0}")]
    BadResponse(String),
}

/// Completion backend for the pipeline.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn complete(&self, call: CompletionCall) -> Result<ProviderReply, ProviderError>;
}

#[derive(Serialize)]
struct WireCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// HTTP client for the OpenRouter chat completions API.
#[derive(Clone)]
pub struct OpenRouterProvider {
    client: Client,
    base_url: String,
    api_key: String,
    /// Sent as `HTTP-Referer`; OpenRouter uses it for app attribution.
    referer: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: impl Into<String>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_PROVIDER_URL.to_string(),
            api_key: api_key.into(),
            referer: "https://windfall.energy".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl InferenceProvider for OpenRouterProvider {
    async fn complete(&self, call: CompletionCall) -> Result<ProviderReply, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = WireCompletionRequest {
            model: &call.model,
            messages: &call.messages,
            temperature: call.temperature,
            max_tokens: call.max_tokens,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", "Windfall")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                detail,
            });
        }

        let completion: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse(e.to_string()))?;
        let latency_ms = started.elapsed().as_millis() as u64;
        debug!(model = %call.model, latency_ms, "completion received");

        Ok(ProviderReply {
            completion,
            latency_ms,
        })
    }
}

impl std::fmt::Debug for OpenRouterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterProvider")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation_and_url_normalization() {
        let provider = OpenRouterProvider::new("sk-or-test")
            .unwrap()
            .with_base_url("https://example.com/api/v1/");
        assert_eq!(provider.base_url(), "https://example.com/api/v1");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let provider = OpenRouterProvider::new("sk-or-secret").unwrap();
        let shown = format!("{provider:?}");
        assert!(!shown.contains("sk-or-secret"));
    }

    #[test]
    fn test_wire_request_omits_absent_options() {
        let request = WireCompletionRequest {
            model: "deepseek/deepseek-chat-v3-0324",
            messages: &[ChatMessage::user("hi")],
            temperature: None,
            max_tokens: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("temperature").is_none());
        assert!(value.get("max_tokens").is_none());

        let request = WireCompletionRequest {
            model: "deepseek/deepseek-chat-v3-0324",
            messages: &[ChatMessage::user("hi")],
            temperature: Some(0.7),
            max_tokens: Some(256),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["temperature"], serde_json::json!(0.7));
        assert_eq!(value["max_tokens"], serde_json::json!(256));
    }
}
