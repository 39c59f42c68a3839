//! Wallet session lookup.
//!
//! Sessions are minted by a SIWE/ERC-8004 sign-in flow that lives
//! outside this crate. The resolver only needs to turn a bearer token
//! into the wallet it is bound to, so the seam is a single-method
//! trait; deployments plug in whatever session backend they run.

use async_trait::async_trait;
use windfall_types::AgentSession;

/// Resolves bearer session tokens to authenticated wallet sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a live session for `token`. `None` means unknown or
    /// expired; the resolver then treats the caller as unauthenticated.
    async fn resolve(&self, token: &str) -> Option<AgentSession>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use windfall_types::SessionKind;

    struct FixedSessions {
        sessions: HashMap<String, AgentSession>,
    }

    #[async_trait]
    impl SessionStore for FixedSessions {
        async fn resolve(&self, token: &str) -> Option<AgentSession> {
            self.sessions.get(token).cloned()
        }
    }

    #[tokio::test]
    async fn test_session_store_object_safety() {
        let mut sessions = HashMap::new();
        sessions.insert(
            "tok-1".to_string(),
            AgentSession {
                wallet_address: "0xabc".to_string(),
                kind: SessionKind::Erc8004,
            },
        );
        let store: Box<dyn SessionStore> = Box::new(FixedSessions { sessions });

        let session = store.resolve("tok-1").await.unwrap();
        assert_eq!(session.kind, SessionKind::Erc8004);
        assert!(store.resolve("tok-2").await.is_none());
    }
}
