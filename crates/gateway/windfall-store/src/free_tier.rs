//! Per-wallet free request counters.
//!
//! Wallets that have never been seen get rows lazily on first
//! consumption. The grant size is policy, so it lives with the caller;
//! this store only counts.

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::{lock_conn, now_iso};

/// A wallet's position against its free grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeTierStatus {
    pub allowed: bool,
    pub used: u32,
    pub remaining: u32,
}

/// SQLite-backed free tier counters.
#[derive(Clone)]
pub struct FreeTierStore {
    conn: Arc<Mutex<Connection>>,
}

impl FreeTierStore {
    /// Create a new free tier store with the given database connection.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Check a wallet against a grant of `grant` free requests.
    /// Unknown wallets are allowed with the full grant remaining.
    pub fn status(&self, wallet_address: &str, grant: u32) -> Result<FreeTierStatus> {
        let used = self.used(wallet_address)?;
        Ok(FreeTierStatus {
            allowed: used < grant,
            used,
            remaining: grant.saturating_sub(used),
        })
    }

    /// Requests a wallet has consumed so far.
    pub fn used(&self, wallet_address: &str) -> Result<u32> {
        let conn = lock_conn(&self.conn)?;
        let used: Option<u32> = conn
            .query_row(
                "SELECT requests_used FROM free_tier WHERE wallet_address = ?1",
                [wallet_address.to_lowercase()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(used.unwrap_or(0))
    }

    /// Consume one free request. Creates the row on first use; the
    /// upsert keeps concurrent consumers from losing increments.
    pub fn consume(&self, wallet_address: &str) -> Result<()> {
        let now = now_iso();
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT INTO free_tier (wallet_address, requests_used, first_request_at, last_request_at)
             VALUES (?1, 1, ?2, ?2)
             ON CONFLICT(wallet_address) DO UPDATE SET
                requests_used = requests_used + 1,
                last_request_at = excluded.last_request_at",
            params![wallet_address.to_lowercase(), now],
        )?;
        Ok(())
    }

    /// Number of wallets that have used the free tier.
    pub fn count(&self) -> Result<i64> {
        let conn = lock_conn(&self.conn)?;
        let count = conn.query_row("SELECT COUNT(*) FROM free_tier", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewayState;

    const WALLET: &str = "0x1111111111111111111111111111111111111111";

    fn store() -> FreeTierStore {
        GatewayState::open_in_memory().unwrap().free_tier
    }

    #[test]
    fn test_unknown_wallet_has_full_grant() {
        let store = store();
        let status = store.status(WALLET, 25).unwrap();
        assert!(status.allowed);
        assert_eq!(status.used, 0);
        assert_eq!(status.remaining, 25);
    }

    #[test]
    fn test_consume_counts_down() {
        let store = store();
        store.consume(WALLET).unwrap();
        store.consume(WALLET).unwrap();

        let status = store.status(WALLET, 25).unwrap();
        assert!(status.allowed);
        assert_eq!(status.used, 2);
        assert_eq!(status.remaining, 23);
    }

    #[test]
    fn test_grant_exhaustion() {
        let store = store();
        for _ in 0..3 {
            store.consume(WALLET).unwrap();
        }

        let status = store.status(WALLET, 3).unwrap();
        assert!(!status.allowed);
        assert_eq!(status.remaining, 0);

        // a larger grant re-admits the same wallet
        let status = store.status(WALLET, 25).unwrap();
        assert!(status.allowed);
        assert_eq!(status.remaining, 22);
    }

    #[test]
    fn test_wallets_are_case_folded() {
        let store = store();
        store.consume("0xABCDEF1234567890ABCDEF1234567890ABCDEF12").unwrap();
        let used = store
            .used("0xabcdef1234567890abcdef1234567890abcdef12")
            .unwrap();
        assert_eq!(used, 1);
        assert_eq!(store.count().unwrap(), 1);
    }
}
