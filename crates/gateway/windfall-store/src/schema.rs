//! SQL schema initialization.
//!
//! This module defines the database schema for SQLite storage.
//!
//! Timestamp convention differs by table: billing tables
//! (`api_keys`, `free_tier`, `request_log`, `revenue`, `used_tx_hashes`)
//! store ISO-8601 strings for auditability, while `response_cache` uses
//! integer Unix milliseconds because expiry comparisons run on every
//! request.

use rusqlite::Connection;

use crate::error::Result;

/// Schema version for migration tracking.
pub const SCHEMA_VERSION: u32 = 2;

/// Initialize the database schema.
///
/// Creates all tables and indexes if they don't exist.
/// This function is idempotent - calling it multiple times is safe.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Enable WAL mode for better concurrent read/write performance
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    // Create schema version table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    // Check current version
    let current_version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    match current_version {
        None => {
            // Fresh database - create all tables
            create_tables(conn)?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }
        Some(version) if version < SCHEMA_VERSION => {
            // Apply migrations
            migrate_schema(conn, version)?;
            conn.execute("UPDATE schema_version SET version = ?1", [SCHEMA_VERSION])?;
        }
        Some(_) => {
            // Current version is up to date
        }
    }

    Ok(())
}

/// Apply schema migrations from the given version to the current version.
fn migrate_schema(conn: &Connection, from_version: u32) -> Result<()> {
    // Migration from version 1 to 2: identity tiers on keys, cache
    // savings tracking, attestation UIDs on the request log
    if from_version < 2 {
        if let Err(e) = conn.execute(
            "ALTER TABLE api_keys ADD COLUMN identity_tier TEXT DEFAULT 'anonymous'",
            [],
        ) {
            if !e.to_string().contains("duplicate column") {
                tracing::warn!(error = %e, "Failed to add identity_tier column to api_keys");
            }
        }

        if let Err(e) = conn.execute(
            "ALTER TABLE response_cache ADD COLUMN saved_usd REAL DEFAULT 0",
            [],
        ) {
            if !e.to_string().contains("duplicate column") {
                tracing::warn!(error = %e, "Failed to add saved_usd column to response_cache");
            }
        }

        if let Err(e) = conn.execute(
            "ALTER TABLE request_log ADD COLUMN attestation_uid TEXT",
            [],
        ) {
            if !e.to_string().contains("duplicate column") {
                tracing::warn!(error = %e, "Failed to add attestation_uid column to request_log");
            }
        }
    }

    Ok(())
}

/// Create all database tables.
fn create_tables(conn: &Connection) -> Result<()> {
    // API keys table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS api_keys (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key_hash TEXT UNIQUE NOT NULL,
            key_prefix TEXT NOT NULL,
            wallet_address TEXT,
            label TEXT,
            identity_tier TEXT DEFAULT 'anonymous',
            balance_usd REAL DEFAULT 0,
            free_requests_remaining INTEGER DEFAULT 25,
            total_requests INTEGER DEFAULT 0,
            total_spent_usd REAL DEFAULT 0,
            total_saved_usd REAL DEFAULT 0,
            created_at TEXT NOT NULL,
            last_used_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_api_keys_hash ON api_keys(key_hash)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_api_keys_wallet ON api_keys(wallet_address)",
        [],
    )?;

    // Per-wallet free tier table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS free_tier (
            wallet_address TEXT PRIMARY KEY,
            requests_used INTEGER DEFAULT 0,
            first_request_at TEXT,
            last_request_at TEXT
        )",
        [],
    )?;

    // Response cache table (millisecond timestamps)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS response_cache (
            cache_key TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            response_json TEXT NOT NULL,
            input_tokens INTEGER DEFAULT 0,
            output_tokens INTEGER DEFAULT 0,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            hit_count INTEGER DEFAULT 0,
            last_hit_at INTEGER,
            saved_usd REAL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cache_expires ON response_cache(expires_at)",
        [],
    )?;

    // Spent payment transaction hashes (append-only)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS used_tx_hashes (
            tx_hash TEXT PRIMARY KEY,
            used_at TEXT NOT NULL
        )",
        [],
    )?;

    // Request log table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS request_log (
            id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            wallet_address TEXT,
            node_id TEXT,
            model TEXT,
            mode TEXT,
            input_tokens INTEGER DEFAULT 0,
            output_tokens INTEGER DEFAULT 0,
            energy_price_kwh REAL,
            carbon_intensity REAL,
            cost_usd REAL DEFAULT 0,
            payment_method TEXT,
            response_time_ms INTEGER,
            attestation_uid TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_request_log_timestamp ON request_log(timestamp)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_request_log_wallet ON request_log(wallet_address)",
        [],
    )?;

    // Revenue table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS revenue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            wallet_address TEXT,
            amount_usd REAL NOT NULL,
            payment_method TEXT,
            tx_hash TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_revenue_timestamp ON revenue(timestamp)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_initialize_schema() {
        let conn = Connection::open_in_memory().unwrap();
        let result = initialize_schema(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn test_wal_mode_enabled() {
        // Note: WAL mode doesn't persist for in-memory databases, so we
        // test with a temporary file database instead.
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let conn = Connection::open(&db_path).unwrap();
        initialize_schema(&conn).unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal", "WAL mode should be enabled after initialization");
    }

    #[test]
    fn test_initialize_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // First initialization
        initialize_schema(&conn).unwrap();

        // Second initialization should succeed
        let result = initialize_schema(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables = [
            "api_keys",
            "free_tier",
            "response_cache",
            "used_tx_hashes",
            "request_log",
            "revenue",
        ];

        for table in tables {
            let exists: i32 = conn
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='{}'",
                        table
                    ),
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_schema_version() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_migration_v1_to_v2() {
        let conn = Connection::open_in_memory().unwrap();

        // Simulate a v1 database: version 1, tables without the v2 columns
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])
            .unwrap();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS api_keys (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key_hash TEXT UNIQUE NOT NULL,
                key_prefix TEXT NOT NULL,
                wallet_address TEXT,
                label TEXT,
                balance_usd REAL DEFAULT 0,
                free_requests_remaining INTEGER DEFAULT 25,
                total_requests INTEGER DEFAULT 0,
                total_spent_usd REAL DEFAULT 0,
                total_saved_usd REAL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_used_at TEXT
            )",
            [],
        )
        .unwrap();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS response_cache (
                cache_key TEXT PRIMARY KEY,
                model TEXT NOT NULL,
                response_json TEXT NOT NULL,
                input_tokens INTEGER DEFAULT 0,
                output_tokens INTEGER DEFAULT 0,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                hit_count INTEGER DEFAULT 0,
                last_hit_at INTEGER
            )",
            [],
        )
        .unwrap();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS request_log (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                wallet_address TEXT
            )",
            [],
        )
        .unwrap();

        // Run migration
        initialize_schema(&conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let has_column: bool = conn
            .prepare("PRAGMA table_info(api_keys)")
            .unwrap()
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .filter_map(|r| r.ok())
            .any(|name| name == "identity_tier");
        assert!(has_column, "identity_tier column should exist after migration");

        let has_column: bool = conn
            .prepare("PRAGMA table_info(response_cache)")
            .unwrap()
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .filter_map(|r| r.ok())
            .any(|name| name == "saved_usd");
        assert!(has_column, "saved_usd column should exist after migration");
    }
}
