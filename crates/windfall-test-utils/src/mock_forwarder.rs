//! Mock implementation of the `PeerForwarder` trait for testing.
//!
//! Records every forwarded request so tests can assert what the entry
//! node sent, and answers with a canned peer reply or a transport
//! failure.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use windfall_pipeline::{ForwardedReply, PeerForwarder, ProxyError};
use windfall_types::{ChatRequest, NodeInfo};

/// One recorded forward attempt.
#[derive(Debug, Clone)]
pub struct ForwardRecord {
    pub peer_id: String,
    pub body: ChatRequest,
    pub from_node_id: String,
    pub wallet_address: Option<String>,
}

struct MockPeerForwarderInner {
    /// Reply returned on success.
    reply: ForwardedReply,
    /// Every forward attempt, in order.
    forwards: Vec<ForwardRecord>,
    /// When true, all forwards fail as unreachable peers.
    should_fail: bool,
}

/// A mock implementation of the `PeerForwarder` trait for testing.
///
/// Uses `Arc<RwLock<...>>` internally, so it is cheap to clone and all
/// clones share the same state.
#[derive(Clone)]
pub struct MockPeerForwarder {
    inner: Arc<RwLock<MockPeerForwarderInner>>,
}

impl Default for MockPeerForwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPeerForwarder {
    /// Create a forwarder whose peers answer 200 with a small
    /// completion already carrying the peer's receipt block.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockPeerForwarderInner {
                reply: ForwardedReply {
                    status: 200,
                    body: json!({
                        "id": "gen-peer-1",
                        "model": "deepseek/deepseek-chat-v3-0324",
                        "choices": [{
                            "index": 0,
                            "message": {"role": "assistant", "content": "peer completion"},
                            "finish_reason": "stop"
                        }],
                        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
                        "windfall": {"node": "wf-peer", "cached": false}
                    }),
                },
                forwards: Vec::new(),
                should_fail: false,
            })),
        }
    }

    /// Replace the canned peer reply.
    pub fn with_reply(self, status: u16, body: Value) -> Self {
        self.inner.write().unwrap().reply = ForwardedReply { status, body };
        self
    }

    /// Configure the mock to fail all forwards.
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

    /// Get all forward attempts made, in order.
    pub fn forwards(&self) -> Vec<ForwardRecord> {
        self.inner.read().unwrap().forwards.clone()
    }

    /// Get the number of forward attempts.
    pub fn forward_count(&self) -> usize {
        self.inner.read().unwrap().forwards.len()
    }

    /// Get the most recent forward attempt, if any.
    pub fn last_forward(&self) -> Option<ForwardRecord> {
        self.inner.read().unwrap().forwards.last().cloned()
    }
}

#[async_trait]
impl PeerForwarder for MockPeerForwarder {
    async fn forward(
        &self,
        peer: &NodeInfo,
        body: &ChatRequest,
        from_node_id: &str,
        wallet_address: Option<&str>,
    ) -> Result<ForwardedReply, ProxyError> {
        let mut inner = self.inner.write().unwrap();
        inner.forwards.push(ForwardRecord {
            peer_id: peer.id.clone(),
            body: body.clone(),
            from_node_id: from_node_id.to_string(),
            wallet_address: wallet_address.map(str::to_string),
        });
        if inner.should_fail {
            return Err(ProxyError::BadResponse(
                "mock: configured to fail".to_string(),
            ));
        }
        Ok(inner.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windfall_types::ChatMessage;

    fn peer() -> NodeInfo {
        NodeInfo::new("wf-peer", "Peerville", "10.0.0.2", "SE-SE3")
    }

    #[tokio::test]
    async fn test_records_forward_details() {
        let forwarder = MockPeerForwarder::new();
        let body = ChatRequest::from_messages(vec![ChatMessage::user("hi")]);
        let reply = forwarder
            .forward(&peer(), &body, "wf-entry", Some("0xabc"))
            .await
            .unwrap();

        assert_eq!(reply.status, 200);
        let record = forwarder.last_forward().unwrap();
        assert_eq!(record.peer_id, "wf-peer");
        assert_eq!(record.from_node_id, "wf-entry");
        assert_eq!(record.wallet_address.as_deref(), Some("0xabc"));
    }

    #[tokio::test]
    async fn test_failure_still_records() {
        let forwarder = MockPeerForwarder::new().with_failure();
        let body = ChatRequest::from_messages(vec![ChatMessage::user("hi")]);
        let err = forwarder
            .forward(&peer(), &body, "wf-entry", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::BadResponse(_)));
        assert_eq!(forwarder.forward_count(), 1);
    }
}
