//! Cache lookup and storage on top of the SQLite-backed store.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::debug;
use windfall_store::{NewCacheEntry, ResponseCacheStore, Result};
use windfall_types::{ChatMessage, TokenUsage};

use crate::key::cache_key;

/// Entries live for an hour unless overridden.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// A cache lookup that found a live entry.
#[derive(Debug, Clone)]
pub struct CacheHit {
    /// The completion exactly as the upstream returned it.
    pub response: Value,
    pub cache_key: String,
    /// Total inference spend this entry has saved so far, before this
    /// hit is recorded.
    pub saved_usd: f64,
}

/// Scoped, TTL-bound completion cache.
#[derive(Clone)]
pub struct SemanticCache {
    store: ResponseCacheStore,
    default_ttl: Duration,
}

impl SemanticCache {
    pub fn new(store: ResponseCacheStore) -> Self {
        Self {
            store,
            default_ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Looks up a completion for the given prompt, model, and scope.
    /// A hit bumps the entry's hit counter.
    pub fn get(
        &self,
        messages: &[ChatMessage],
        model: &str,
        scope: &str,
    ) -> Result<Option<CacheHit>> {
        let key = cache_key(messages, model, scope)?;
        let Some(cached) = self.store.touch(&key, now_ms())? else {
            return Ok(None);
        };
        let response: Value = serde_json::from_str(&cached.response_json)?;
        debug!(cache_key = %key, hits = cached.hit_count + 1, "cache hit");
        Ok(Some(CacheHit {
            response,
            cache_key: key,
            saved_usd: cached.saved_usd,
        }))
    }

    /// Stores a completion under the derived key. Returns the key so
    /// callers can attribute later savings to it.
    pub fn put(
        &self,
        messages: &[ChatMessage],
        model: &str,
        scope: &str,
        response: &Value,
        usage: &TokenUsage,
    ) -> Result<String> {
        let key = cache_key(messages, model, scope)?;
        let entry = NewCacheEntry {
            cache_key: key.clone(),
            model: model.to_lowercase(),
            response_json: serde_json::to_string(response)?,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            saved_usd: 0.0,
        };
        self.store
            .insert(&entry, now_ms(), self.default_ttl.as_millis() as u64)?;
        Ok(key)
    }

    /// Credits a hit's avoided inference cost to its entry.
    pub fn record_savings(&self, cache_key: &str, amount_usd: f64) -> Result<()> {
        self.store.add_saved(cache_key, amount_usd)
    }

    /// Drops entries past their expiry. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        self.store.purge_expired(now_ms())
    }

    pub fn stats(&self) -> Result<windfall_store::CacheStats> {
        self.store.stats(now_ms())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
