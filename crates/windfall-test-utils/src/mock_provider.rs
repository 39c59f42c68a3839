//! Mock implementation of the `InferenceProvider` trait for testing.
//!
//! Returns a canned completion and records every call so tests can
//! assert on the model, messages, and token caps the pipeline sent.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use windfall_pipeline::{CompletionCall, InferenceProvider, ProviderError, ProviderReply};

struct MockProviderInner {
    /// Completion body returned on success.
    completion: Value,
    /// Every call made, in order.
    calls: Vec<CompletionCall>,
    /// When true, all calls return an upstream 502.
    should_fail: bool,
}

/// A mock implementation of the `InferenceProvider` trait for testing.
///
/// Uses `Arc<RwLock<...>>` internally, so it is cheap to clone and all
/// clones share the same state.
#[derive(Clone)]
pub struct MockProvider {
    inner: Arc<RwLock<MockProviderInner>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a provider answering with a small deepseek completion.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockProviderInner {
                completion: json!({
                    "id": "gen-mock-1",
                    "model": "deepseek/deepseek-chat-v3-0324",
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": "mock completion"},
                        "finish_reason": "stop"
                    }],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
                }),
                calls: Vec::new(),
                should_fail: false,
            })),
        }
    }

    /// Replace the canned completion body.
    pub fn with_completion(self, completion: Value) -> Self {
        self.inner.write().unwrap().completion = completion;
        self
    }

    /// Override the model name the completion reports.
    pub fn with_model(self, model: &str) -> Self {
        {
            let mut inner = self.inner.write().unwrap();
            if let Some(obj) = inner.completion.as_object_mut() {
                obj.insert("model".to_string(), Value::String(model.to_string()));
            }
        }
        self
    }

    /// Configure the mock to fail all calls.
    pub fn with_failure(self) -> Self {
        self.inner.write().unwrap().should_fail = true;
        self
    }

    /// Set the failure mode at runtime.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.inner.write().unwrap().should_fail = should_fail;
    }

    // =========================================================================
    // Assertion Helpers
    // =========================================================================

    /// Get all calls made, in order.
    pub fn calls(&self) -> Vec<CompletionCall> {
        self.inner.read().unwrap().calls.clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.inner.read().unwrap().calls.len()
    }

    /// Get the most recent call, if any.
    pub fn last_call(&self) -> Option<CompletionCall> {
        self.inner.read().unwrap().calls.last().cloned()
    }
}

#[async_trait]
impl InferenceProvider for MockProvider {
    async fn complete(&self, call: CompletionCall) -> Result<ProviderReply, ProviderError> {
        let mut inner = self.inner.write().unwrap();
        inner.calls.push(call);
        if inner.should_fail {
            return Err(ProviderError::Upstream {
                status: 502,
                detail: "mock: configured to fail".to_string(),
            });
        }
        Ok(ProviderReply {
            completion: inner.completion.clone(),
            latency_ms: 7,
        })
    }
}
