//! Mock implementation of the `AttestationSink` trait for testing.
//!
//! Submissions happen on spawned tasks in the pipeline, so the sink
//! offers [`MockAttestationSink::wait_for`] to let a test park until
//! the spawned submission has landed.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use windfall_pipeline::{AttestationData, AttestationError, AttestationSink};

struct MockAttestationSinkInner {
    submissions: Vec<AttestationData>,
    should_fail: bool,
}

/// A mock implementation of the `AttestationSink` trait for testing.
///
/// Uses `Arc<RwLock<...>>` internally, so it is cheap to clone and all
/// clones share the same state.
#[derive(Clone)]
pub struct MockAttestationSink {
    inner: Arc<RwLock<MockAttestationSinkInner>>,
}

impl Default for MockAttestationSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAttestationSink {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockAttestationSinkInner {
                submissions: Vec::new(),
                should_fail: false,
            })),
        }
    }

    /// Configure the mock to fail all submissions.
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

    /// Get all submissions received, in order.
    pub fn submissions(&self) -> Vec<AttestationData> {
        self.inner.read().unwrap().submissions.clone()
    }

    /// Get the number of submissions received.
    pub fn submission_count(&self) -> usize {
        self.inner.read().unwrap().submissions.len()
    }

    /// Yield until at least `count` submissions have arrived. Panics
    /// after enough yields that a spawned submission must be stuck.
    pub async fn wait_for(&self, count: usize) {
        for _ in 0..100 {
            if self.submission_count() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!(
            "attestation sink has {} submissions, expected {count}",
            self.submission_count()
        );
    }
}

#[async_trait]
impl AttestationSink for MockAttestationSink {
    async fn submit(&self, data: AttestationData) -> Result<(), AttestationError> {
        let mut inner = self.inner.write().unwrap();
        if inner.should_fail {
            return Err(AttestationError("mock: configured to fail".to_string()));
        }
        inner.submissions.push(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(node_id: &str) -> AttestationData {
        AttestationData {
            timestamp: 1_700_000_000,
            node_id: node_id.to_string(),
            lat: 59.33,
            lon: 18.07,
            energy_price_per_kwh: 0.04,
            carbon_intensity: 35.0,
            curtailment_active: false,
            model: "deepseek/deepseek-chat-v3-0324".to_string(),
            response_hash: "req-1".to_string(),
            request_count: 1,
        }
    }

    #[tokio::test]
    async fn test_records_submissions() {
        let sink = MockAttestationSink::new();
        sink.submit(data("wf-sto")).await.unwrap();
        assert_eq!(sink.submission_count(), 1);
        assert_eq!(sink.submissions()[0].node_id, "wf-sto");
    }

    #[tokio::test]
    async fn test_wait_for_sees_spawned_submission() {
        let sink = MockAttestationSink::new();
        let task_sink = sink.clone();
        tokio::spawn(async move {
            task_sink.submit(data("wf-sto")).await.unwrap();
        });
        sink.wait_for(1).await;
        assert_eq!(sink.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_records_nothing() {
        let sink = MockAttestationSink::new().with_failure();
        assert!(sink.submit(data("wf-sto")).await.is_err());
        assert_eq!(sink.submission_count(), 0);
    }
}
