//! Mock implementation of the x402 `Facilitator` trait for testing.
//!
//! Approves or rejects payloads on demand and records every verify and
//! settle call.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use windfall_x402::types::{PaymentPayload, PaymentRequirement, SettleResponse, VerifyResponse};
use windfall_x402::{Facilitator, X402Result};

struct MockFacilitatorInner {
    /// Reason returned from verify; `None` means valid.
    invalid_reason: Option<String>,
    /// Reason returned from settle; `None` means success.
    settle_failure: Option<String>,
    /// Payer reported back on success.
    payer: String,
    /// Settlement tx hash reported back on success.
    transaction: String,
    verify_calls: usize,
    settle_calls: usize,
}

/// A mock implementation of the `Facilitator` trait for testing.
///
/// Uses `Arc<RwLock<...>>` internally, so it is cheap to clone and all
/// clones share the same state.
#[derive(Clone)]
pub struct MockFacilitator {
    inner: Arc<RwLock<MockFacilitatorInner>>,
}

impl Default for MockFacilitator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFacilitator {
    /// Create a facilitator that verifies and settles everything.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockFacilitatorInner {
                invalid_reason: None,
                settle_failure: None,
                payer: "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".to_string(),
                transaction: "0xfacfacfacfacfacfacfacfacfacfacfacfacfacfacfacfacfacfacfacfacfac0"
                    .to_string(),
                verify_calls: 0,
                settle_calls: 0,
            })),
        }
    }

    /// Make verification fail with the given reason.
    pub fn with_invalid(self, reason: &str) -> Self {
        self.inner.write().unwrap().invalid_reason = Some(reason.to_string());
        self
    }

    /// Make settlement fail with the given reason.
    pub fn with_settle_failure(self, reason: &str) -> Self {
        self.inner.write().unwrap().settle_failure = Some(reason.to_string());
        self
    }

    /// Override the payer reported on success.
    pub fn with_payer(self, payer: &str) -> Self {
        self.inner.write().unwrap().payer = payer.to_string();
        self
    }

    /// Override the settlement transaction hash.
    pub fn with_transaction(self, tx_hash: &str) -> Self {
        self.inner.write().unwrap().transaction = tx_hash.to_string();
        self
    }

    // =========================================================================
    // Assertion Helpers
    // =========================================================================

    pub fn verify_calls(&self) -> usize {
        self.inner.read().unwrap().verify_calls
    }

    pub fn settle_calls(&self) -> usize {
        self.inner.read().unwrap().settle_calls
    }
}

#[async_trait]
impl Facilitator for MockFacilitator {
    async fn verify(
        &self,
        _payload: &PaymentPayload,
        _requirements: &PaymentRequirement,
    ) -> X402Result<VerifyResponse> {
        let mut inner = self.inner.write().unwrap();
        inner.verify_calls += 1;
        Ok(match &inner.invalid_reason {
            Some(reason) => VerifyResponse {
                is_valid: false,
                invalid_reason: Some(reason.clone()),
                payer: None,
            },
            None => VerifyResponse {
                is_valid: true,
                invalid_reason: None,
                payer: Some(inner.payer.clone()),
            },
        })
    }

    async fn settle(
        &self,
        _payload: &PaymentPayload,
        _requirements: &PaymentRequirement,
    ) -> X402Result<SettleResponse> {
        let mut inner = self.inner.write().unwrap();
        inner.settle_calls += 1;
        Ok(match &inner.settle_failure {
            Some(reason) => SettleResponse {
                success: false,
                error_reason: Some(reason.clone()),
                transaction: None,
                network: None,
                payer: None,
            },
            None => SettleResponse {
                success: true,
                error_reason: None,
                transaction: Some(inner.transaction.clone()),
                network: Some("eip155:8453".to_string()),
                payer: Some(inner.payer.clone()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windfall_x402::{PaymentRequired, X402Config};

    fn payload() -> PaymentPayload {
        serde_json::from_value(serde_json::json!({
            "x402Version": 2,
            "scheme": "exact",
            "network": "eip155:8453",
            "payload": {
                "signature": "0xsig",
                "authorization": {
                    "from": "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
                    "to": "0x9fe46736679d2d9a65f0992f2272de9f3c7fa6e0",
                    "value": "1000",
                    "validAfter": "0",
                    "validBefore": "99999999999",
                    "nonce": "0xabc123"
                }
            }
        }))
        .unwrap()
    }

    fn requirement() -> PaymentRequirement {
        PaymentRequired::for_inference(
            "/v1/chat/completions",
            "LLM inference",
            0.001,
            &X402Config::mainnet("0x9fe46736679d2d9a65f0992f2272de9f3c7fa6e0"),
        )
        .accepts
        .remove(0)
    }

    #[tokio::test]
    async fn test_verifies_and_settles_by_default() {
        let fac = MockFacilitator::new();
        let verify = fac.verify(&payload(), &requirement()).await.unwrap();
        assert!(verify.is_valid);
        let settle = fac.settle(&payload(), &requirement()).await.unwrap();
        assert!(settle.success);
        assert!(settle.transaction.is_some());
        assert_eq!(fac.verify_calls(), 1);
        assert_eq!(fac.settle_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_reason_propagates() {
        let fac = MockFacilitator::new().with_invalid("bad signature");
        let verify = fac.verify(&payload(), &requirement()).await.unwrap();
        assert!(!verify.is_valid);
        assert_eq!(verify.invalid_reason.as_deref(), Some("bad signature"));
    }
}
