//! Mock implementation of the `SessionStore` trait for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use windfall_pay::SessionStore;
use windfall_types::{AgentSession, SessionKind};

/// A mock implementation of the `SessionStore` trait for testing.
///
/// Maps bearer tokens to sessions. Uses `Arc<RwLock<...>>` internally,
/// so it is cheap to clone and all clones share the same state.
#[derive(Clone, Default)]
pub struct MockSessionStore {
    sessions: Arc<RwLock<HashMap<String, AgentSession>>>,
}

impl MockSessionStore {
    /// Create an empty store: every token resolves to `None`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a SIWE wallet session under `token`.
    pub fn with_wallet_session(self, token: &str, wallet_address: &str) -> Self {
        self.insert(token, wallet_address, SessionKind::Wallet);
        self
    }

    /// Register an ERC-8004 agent session under `token`.
    pub fn with_agent_session(self, token: &str, wallet_address: &str) -> Self {
        self.insert(token, wallet_address, SessionKind::Erc8004);
        self
    }

    /// Drop a session, simulating expiry.
    pub fn expire(&self, token: &str) {
        self.sessions.write().unwrap().remove(token);
    }

    fn insert(&self, token: &str, wallet_address: &str, kind: SessionKind) {
        self.sessions.write().unwrap().insert(
            token.to_string(),
            AgentSession {
                wallet_address: wallet_address.to_lowercase(),
                kind,
            },
        );
    }
}

#[async_trait]
impl SessionStore for MockSessionStore {
    async fn resolve(&self, token: &str) -> Option<AgentSession> {
        self.sessions.read().unwrap().get(token).cloned()
    }
}
