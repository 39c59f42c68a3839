//! Row-level storage for the response cache.
//!
//! Semantics (key derivation, normalization, TTL policy) live in the
//! `windfall-cache` crate; this component only moves rows. All
//! timestamps here are Unix milliseconds because expiry comparisons run
//! on the hot path of every request.

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::lock_conn;

/// A cache row that was still live at lookup time.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub cache_key: String,
    pub model: String,
    pub response_json: String,
    /// Accumulated USD the entry has saved callers so far.
    pub saved_usd: f64,
    /// Hits before this lookup.
    pub hit_count: i64,
}

/// A row to insert.
#[derive(Debug, Clone)]
pub struct NewCacheEntry {
    pub cache_key: String,
    /// Lowercased model name.
    pub model: String,
    pub response_json: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Initial savings attributed to the entry (the price the first
    /// caller paid).
    pub saved_usd: f64,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct CacheStats {
    /// Live (unexpired) entries.
    pub total_entries: i64,
    /// Hits across all entries, expired included.
    pub total_hits: i64,
    pub total_saved_usd: f64,
    /// `hits / (hits + entries)`, zero when empty.
    pub hit_rate: f64,
    /// Top live models by hits, at most five.
    pub top_models: Vec<ModelCacheStats>,
}

/// Per-model slice of the cache statistics.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ModelCacheStats {
    pub model: String,
    pub entries: i64,
    pub hits: i64,
}

/// SQLite-backed response cache rows.
#[derive(Clone)]
pub struct ResponseCacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl ResponseCacheStore {
    /// Create a new response cache store with the given database connection.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Fetch a live entry and record the hit. Expired rows are treated
    /// as absent (they stay on disk until [`purge_expired`] runs).
    ///
    /// [`purge_expired`]: ResponseCacheStore::purge_expired
    pub fn touch(&self, cache_key: &str, now_ms: u64) -> Result<Option<CachedResponse>> {
        let conn = lock_conn(&self.conn)?;
        let row = conn
            .query_row(
                "SELECT cache_key, model, response_json, saved_usd, hit_count
                 FROM response_cache
                 WHERE cache_key = ?1 AND expires_at > ?2",
                params![cache_key, now_ms as i64],
                |row| {
                    Ok(CachedResponse {
                        cache_key: row.get(0)?,
                        model: row.get(1)?,
                        response_json: row.get(2)?,
                        saved_usd: row.get(3)?,
                        hit_count: row.get(4)?,
                    })
                },
            )
            .optional()?;

        if row.is_some() {
            conn.execute(
                "UPDATE response_cache SET hit_count = hit_count + 1, last_hit_at = ?1
                 WHERE cache_key = ?2",
                params![now_ms as i64, cache_key],
            )?;
        }

        Ok(row)
    }

    /// Insert or replace an entry expiring `ttl_ms` from `now_ms`.
    pub fn insert(&self, entry: &NewCacheEntry, now_ms: u64, ttl_ms: u64) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO response_cache
                (cache_key, model, response_json, input_tokens, output_tokens,
                 created_at, expires_at, hit_count, last_hit_at, saved_usd)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, NULL, ?8)",
            params![
                entry.cache_key,
                entry.model,
                entry.response_json,
                entry.input_tokens,
                entry.output_tokens,
                now_ms as i64,
                (now_ms + ttl_ms) as i64,
                entry.saved_usd,
            ],
        )?;
        Ok(())
    }

    /// Add to an entry's accumulated savings.
    pub fn add_saved(&self, cache_key: &str, amount_usd: f64) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "UPDATE response_cache SET saved_usd = saved_usd + ?1 WHERE cache_key = ?2",
            params![amount_usd, cache_key],
        )?;
        Ok(())
    }

    /// Delete expired rows. Returns the number removed.
    pub fn purge_expired(&self, now_ms: u64) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        let removed = conn.execute(
            "DELETE FROM response_cache WHERE expires_at <= ?1",
            [now_ms as i64],
        )?;
        if removed > 0 {
            tracing::debug!(removed, "purged expired cache entries");
        }
        Ok(removed)
    }

    /// Aggregate statistics at `now_ms`.
    pub fn stats(&self, now_ms: u64) -> Result<CacheStats> {
        let conn = lock_conn(&self.conn)?;

        let total_entries: i64 = conn.query_row(
            "SELECT COUNT(*) FROM response_cache WHERE expires_at > ?1",
            [now_ms as i64],
            |row| row.get(0),
        )?;
        let total_hits: i64 = conn.query_row(
            "SELECT COALESCE(SUM(hit_count), 0) FROM response_cache",
            [],
            |row| row.get(0),
        )?;
        let total_saved_usd: f64 = conn.query_row(
            "SELECT COALESCE(SUM(saved_usd), 0) FROM response_cache",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT model, COUNT(*) AS entries, SUM(hit_count) AS hits
             FROM response_cache
             WHERE expires_at > ?1
             GROUP BY model
             ORDER BY hits DESC
             LIMIT 5",
        )?;
        let top_models = stmt
            .query_map([now_ms as i64], |row| {
                Ok(ModelCacheStats {
                    model: row.get(0)?,
                    entries: row.get(1)?,
                    hits: row.get(2)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        let denominator = total_hits + total_entries;
        let hit_rate = if denominator > 0 {
            total_hits as f64 / denominator as f64
        } else {
            0.0
        };

        Ok(CacheStats {
            total_entries,
            total_hits,
            total_saved_usd,
            hit_rate,
            top_models,
        })
    }
}
