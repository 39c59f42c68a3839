//! Append-only ledger of spent payment transaction hashes.
//!
//! A hash pays for exactly one request, ever. The ledger survives
//! restarts, and [`TxLedgerStore::claim`] is the only write path: the
//! `INSERT OR IGNORE` decides the winner when two requests race on the
//! same hash.

use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::{lock_conn, now_iso};

/// SQLite-backed spent transaction ledger.
#[derive(Clone)]
pub struct TxLedgerStore {
    conn: Arc<Mutex<Connection>>,
}

impl TxLedgerStore {
    /// Create a new ledger with the given database connection.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Whether a hash has already paid for a request.
    pub fn is_used(&self, tx_hash: &str) -> Result<bool> {
        let conn = lock_conn(&self.conn)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM used_tx_hashes WHERE tx_hash = ?1",
            [tx_hash.to_lowercase()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Atomically claim a hash. Returns true for the winner; false
    /// means some other request (possibly long ago) already spent it.
    pub fn claim(&self, tx_hash: &str) -> Result<bool> {
        let conn = lock_conn(&self.conn)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO used_tx_hashes (tx_hash, used_at) VALUES (?1, ?2)",
            params![tx_hash.to_lowercase(), now_iso()],
        )?;
        Ok(inserted == 1)
    }

    /// Total hashes ever claimed.
    pub fn count(&self) -> Result<i64> {
        let conn = lock_conn(&self.conn)?;
        let count = conn.query_row("SELECT COUNT(*) FROM used_tx_hashes", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewayState;

    fn store() -> TxLedgerStore {
        GatewayState::open_in_memory().unwrap().tx_ledger
    }

    #[test]
    fn test_claim_once() {
        let store = store();
        assert!(!store.is_used("0xAAA").unwrap());
        assert!(store.claim("0xAAA").unwrap());
        assert!(store.is_used("0xAAA").unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_second_claim_loses() {
        let store = store();
        assert!(store.claim("0xBBB").unwrap());
        assert!(!store.claim("0xBBB").unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_hashes_are_case_folded() {
        let store = store();
        assert!(store.claim("0xAbCd").unwrap());
        assert!(store.is_used("0xABCD").unwrap());
        assert!(!store.claim("0xabcd").unwrap());
    }
}
