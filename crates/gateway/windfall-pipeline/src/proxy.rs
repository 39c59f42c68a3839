//! Node-to-node request forwarding.
//!
//! When routing selects a peer, the entry node bills the request and
//! forwards it with trusted-proxy markers; the peer recognizes those
//! (plus the entry node's IP) and skips payment resolution.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use windfall_types::{ChatRequest, NodeInfo};

/// Forwarded requests wait out a full generation on the peer.
pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(60);

/// Whatever the peer answered, passed back to the caller unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardedReply {
    pub status: u16,
    pub body: Value,
}

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The peer could not be reached or timed out.
    #[error("peer transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The peer answered but the body was not valid JSON.
    #[error("peer response unreadable: {0}")]
    BadResponse(String),
}

/// Forwarding backend; the production implementation is
/// [`HttpPeerForwarder`].
#[async_trait]
pub trait PeerForwarder: Send + Sync {
    /// Forward a billed request to a peer. The body must already carry
    /// the resolved model and the `_payment_verified` marker.
    async fn forward(
        &self,
        peer: &NodeInfo,
        body: &ChatRequest,
        from_node_id: &str,
        wallet_address: Option<&str>,
    ) -> Result<ForwardedReply, ProxyError>;
}

/// HTTP forwarder hitting the peer's inference endpoint directly.
#[derive(Clone)]
pub struct HttpPeerForwarder {
    client: Client,
    /// Port every fleet node serves the endpoint on.
    port: u16,
}

impl HttpPeerForwarder {
    pub fn new(port: u16) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(DEFAULT_PROXY_TIMEOUT).build()?;
        Ok(Self { client, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl PeerForwarder for HttpPeerForwarder {
    async fn forward(
        &self,
        peer: &NodeInfo,
        body: &ChatRequest,
        from_node_id: &str,
        wallet_address: Option<&str>,
    ) -> Result<ForwardedReply, ProxyError> {
        let url = format!("http://{}:{}/v1/chat/completions", peer.ip, self.port);
        debug!(peer = %peer.id, url = %url, "forwarding request");

        let mut request = self
            .client
            .post(&url)
            .header("X-Proxied-From", from_node_id)
            .header("X-Payment-Verified", "true")
            .json(body);
        if let Some(wallet) = wallet_address {
            request = request.header("X-Wallet-Address", wallet);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        // The peer's answer is relayed as-is, error statuses included.
        let body: Value = response
            .json()
            .await
            .map_err(|e| ProxyError::BadResponse(e.to_string()))?;

        Ok(ForwardedReply { status, body })
    }
}

impl std::fmt::Debug for HttpPeerForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPeerForwarder")
            .field("port", &self.port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarder_creation() {
        let forwarder = HttpPeerForwarder::new(4000).unwrap();
        assert_eq!(forwarder.port(), 4000);
    }

    #[test]
    fn test_forwarder_debug() {
        let forwarder = HttpPeerForwarder::new(4000).unwrap();
        assert!(format!("{forwarder:?}").contains("4000"));
    }
}
