//! SQLite persistence for the Windfall inference gateway.
//!
//! All durable gateway state lives in one database file:
//!
//! ```text
//! ~/.windfall/
//! └── windfall.db     SQLite database (WAL mode)
//!     ├── api_keys           issued keys, balances, free grants
//!     ├── free_tier          per-wallet free request counters
//!     ├── response_cache     cached completions with TTL
//!     ├── used_tx_hashes     spent payment transactions (append-only)
//!     ├── request_log        per-request usage records
//!     └── revenue            collected payments
//! ```
//!
//! [`GatewayState`] owns the connection and exposes one component per
//! concern. Components share a single `Arc<Mutex<Connection>>`, so a
//! clone of a component is cheap and safe to hand to another task.
//!
//! # Example
//!
//! ```no_run
//! use windfall_store::{GatewayState, GatewayStateConfig};
//!
//! # fn main() -> windfall_store::Result<()> {
//! let config = GatewayStateConfig::new(windfall_store::default_data_dir());
//! let state = GatewayState::open(config)?;
//! let stats = state.request_log.usage_stats()?;
//! println!("served {} requests", stats.total_requests);
//! # Ok(())
//! # }
//! ```

pub mod api_keys;
pub mod error;
pub mod free_tier;
pub mod request_log;
pub mod response_cache;
pub mod schema;
pub mod tx_ledger;

pub use api_keys::{ApiKeyRecord, ApiKeyStore, DeductOutcome, IssuedKey, SpendCheck};
pub use error::{Result, StoreError};
pub use free_tier::{FreeTierStatus, FreeTierStore};
pub use request_log::{RequestLogStore, RequestRecord, UsageStats};
pub use response_cache::{CacheStats, CachedResponse, ModelCacheStats, NewCacheEntry, ResponseCacheStore};
pub use tx_ledger::TxLedgerStore;

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Default data directory for gateway state.
///
/// Resolution order:
/// 1. `WINDFALL_DATA_DIR` environment variable
/// 2. Platform data directory (e.g. `~/.local/share/windfall`)
/// 3. `~/.windfall`
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("WINDFALL_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(dirs) = directories::ProjectDirs::from("energy", "windfall", "windfall") {
        return dirs.data_dir().to_path_buf();
    }

    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".windfall"),
        None => PathBuf::from(".windfall"),
    }
}

/// Configuration for opening gateway state.
#[derive(Debug, Clone)]
pub struct GatewayStateConfig {
    base_dir: PathBuf,
    database_path: Option<PathBuf>,
}

impl GatewayStateConfig {
    /// Create a configuration rooted at the given directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            database_path: None,
        }
    }

    /// Override the database file location.
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Effective database path.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.base_dir.join("windfall.db"))
    }
}

impl Default for GatewayStateConfig {
    fn default() -> Self {
        Self::new(default_data_dir())
    }
}

/// Durable gateway state: one SQLite database, one component per concern.
pub struct GatewayState {
    /// Issued API keys, balances, and per-key free grants.
    pub api_keys: ApiKeyStore,
    /// Per-wallet free request counters.
    pub free_tier: FreeTierStore,
    /// Cached completions with TTL and savings tracking.
    pub response_cache: ResponseCacheStore,
    /// Spent payment transaction hashes.
    pub tx_ledger: TxLedgerStore,
    /// Request and revenue records.
    pub request_log: RequestLogStore,
    conn: Arc<Mutex<Connection>>,
    config: GatewayStateConfig,
}

impl GatewayState {
    /// Open (or create) gateway state at the configured location.
    pub fn open(config: GatewayStateConfig) -> Result<Self> {
        std::fs::create_dir_all(config.base_dir())?;

        let db_path = config.database_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        schema::initialize_schema(&conn)?;
        let conn = Arc::new(Mutex::new(conn));

        tracing::debug!(path = %db_path.display(), "opened gateway database");

        Ok(Self {
            api_keys: ApiKeyStore::new(Arc::clone(&conn)),
            free_tier: FreeTierStore::new(Arc::clone(&conn)),
            response_cache: ResponseCacheStore::new(Arc::clone(&conn)),
            tx_ledger: TxLedgerStore::new(Arc::clone(&conn)),
            request_log: RequestLogStore::new(Arc::clone(&conn)),
            conn,
            config,
        })
    }

    /// Open gateway state backed by an in-memory database. State is
    /// lost on drop; intended for tests and ephemeral tooling.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize_schema(&conn)?;
        let conn = Arc::new(Mutex::new(conn));

        Ok(Self {
            api_keys: ApiKeyStore::new(Arc::clone(&conn)),
            free_tier: FreeTierStore::new(Arc::clone(&conn)),
            response_cache: ResponseCacheStore::new(Arc::clone(&conn)),
            tx_ledger: TxLedgerStore::new(Arc::clone(&conn)),
            request_log: RequestLogStore::new(Arc::clone(&conn)),
            conn,
            config: GatewayStateConfig::new("."),
        })
    }

    pub fn config(&self) -> &GatewayStateConfig {
        &self.config
    }

    /// Shared database connection, for components built outside this
    /// crate.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }
}

/// Acquire the connection lock, converting poisoning into a store error.
pub(crate) fn lock_conn(conn: &Arc<Mutex<Connection>>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| StoreError::lock_poisoned("database connection"))
}

/// Current time as an ISO-8601 string with millisecond precision.
pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in Unix milliseconds.
pub(crate) fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// ISO-8601 timestamp `days` days before now. Used for retention
/// cutoffs; ISO strings of the same format compare lexicographically.
pub(crate) fn iso_days_ago(days: u32) -> String {
    (Utc::now() - chrono::Duration::days(i64::from(days)))
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
