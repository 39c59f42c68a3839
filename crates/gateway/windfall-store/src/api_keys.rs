//! API key issuance, validation, and billing.
//!
//! Keys are random 32-byte secrets rendered as `wf_<base64url>`. Only a
//! SHA-256 hash is stored; the full key is returned exactly once at
//! creation. Each key carries a prepaid USD balance and a free-request
//! grant sized by the identity tier it was created with.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};

use windfall_types::identity::{IdentityTier, API_KEY_PREFIX};

use crate::error::Result;
use crate::{iso_days_ago, lock_conn, now_iso};

/// Characters of the key shown in listings (`wf_` plus 9 of payload).
const PREFIX_LEN: usize = 12;

/// A stored API key row. Never contains the key itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiKeyRecord {
    pub id: i64,
    /// First characters of the key plus `...`, for display.
    pub key_prefix: String,
    /// Lowercased wallet the key was registered with, if any.
    pub wallet_address: Option<String>,
    pub label: Option<String>,
    pub identity_tier: IdentityTier,
    pub balance_usd: f64,
    pub free_requests_remaining: i64,
    pub total_requests: i64,
    pub total_spent_usd: f64,
    pub total_saved_usd: f64,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

/// A freshly created key. `key` is the only copy of the secret.
#[derive(Debug, Clone)]
pub struct IssuedKey {
    pub key: String,
    pub record: ApiKeyRecord,
}

/// Whether a key can pay for a request, and how.
#[derive(Debug, Clone, PartialEq)]
pub enum SpendCheck {
    /// The key still has free requests.
    FreeTier,
    /// The prepaid balance covers the cost.
    Balance,
    /// Neither quota nor balance suffices.
    Denied { reason: String },
}

/// Which pool an executed deduction actually drew from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeductOutcome {
    FreeTier,
    Balance,
    /// Both guarded updates missed: the key was drained between the
    /// spend check and the deduction. Nothing was charged.
    Unfunded,
}

/// SQLite-backed API key store.
#[derive(Clone)]
pub struct ApiKeyStore {
    conn: Arc<Mutex<Connection>>,
}

impl ApiKeyStore {
    /// Create a new API key store with the given database connection.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Issue a new key. `free_requests` overrides the tier grant when
    /// set.
    pub fn create(
        &self,
        wallet_address: Option<&str>,
        label: Option<&str>,
        tier: IdentityTier,
        free_requests: Option<u32>,
    ) -> Result<IssuedKey> {
        let key = generate_key();
        let key_hash = hash_key(&key);
        let key_prefix = format!("{}...", &key[..PREFIX_LEN]);
        let wallet = wallet_address.map(|w| w.to_lowercase());
        let grant = free_requests.unwrap_or_else(|| tier.free_requests());
        let created_at = now_iso();

        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT INTO api_keys
                (key_hash, key_prefix, wallet_address, label, identity_tier,
                 free_requests_remaining, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                key_hash,
                key_prefix,
                wallet,
                label,
                tier.as_str(),
                grant,
                created_at
            ],
        )?;
        let id = conn.last_insert_rowid();

        let record = conn.query_row(
            &format!("SELECT {COLUMNS} FROM api_keys WHERE id = ?1"),
            [id],
            row_to_record,
        )?;

        tracing::info!(key_id = id, tier = %tier, grant, "issued API key");
        Ok(IssuedKey { key, record })
    }

    /// Look up a key by its raw value and touch `last_used_at`.
    /// Returns `None` for unknown keys or anything without the `wf_`
    /// prefix.
    pub fn validate(&self, raw_key: &str) -> Result<Option<ApiKeyRecord>> {
        if !raw_key.starts_with(API_KEY_PREFIX) {
            return Ok(None);
        }
        let key_hash = hash_key(raw_key);

        let conn = lock_conn(&self.conn)?;
        let record = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM api_keys WHERE key_hash = ?1"),
                [&key_hash],
                row_to_record,
            )
            .optional()?;

        if let Some(ref record) = record {
            conn.execute(
                "UPDATE api_keys SET last_used_at = ?1 WHERE id = ?2",
                params![now_iso(), record.id],
            )?;
        }

        Ok(record)
    }

    pub fn get(&self, key_id: i64) -> Result<Option<ApiKeyRecord>> {
        let conn = lock_conn(&self.conn)?;
        let record = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM api_keys WHERE id = ?1"),
                [key_id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// All keys registered to a wallet, newest first.
    pub fn list_for_wallet(&self, wallet_address: &str) -> Result<Vec<ApiKeyRecord>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM api_keys WHERE wallet_address = ?1 ORDER BY created_at DESC"
        ))?;
        let records = stmt
            .query_map([wallet_address.to_lowercase()], row_to_record)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    /// Decide how a request of `cost_usd` would be paid.
    pub fn can_make_request(&self, key_id: i64, cost_usd: f64) -> Result<SpendCheck> {
        let Some(record) = self.get(key_id)? else {
            return Ok(SpendCheck::Denied {
                reason: "Key not found".to_string(),
            });
        };

        if record.free_requests_remaining > 0 {
            return Ok(SpendCheck::FreeTier);
        }
        if record.balance_usd >= cost_usd {
            return Ok(SpendCheck::Balance);
        }
        Ok(SpendCheck::Denied {
            reason: format!(
                "Insufficient balance. Free tier exhausted. Balance: ${:.4}, cost: ${:.4}",
                record.balance_usd, cost_usd
            ),
        })
    }

    /// Charge a key for one executed request: free grant first, then
    /// balance. Both updates are guarded so a raced key never goes
    /// negative.
    pub fn deduct_request(
        &self,
        key_id: i64,
        cost_usd: f64,
        saved_usd: f64,
    ) -> Result<DeductOutcome> {
        let now = now_iso();
        let conn = lock_conn(&self.conn)?;

        let changed = conn.execute(
            "UPDATE api_keys SET
                free_requests_remaining = free_requests_remaining - 1,
                total_requests = total_requests + 1,
                total_saved_usd = total_saved_usd + ?1,
                last_used_at = ?2
             WHERE id = ?3 AND free_requests_remaining > 0",
            params![saved_usd, now, key_id],
        )?;
        if changed > 0 {
            return Ok(DeductOutcome::FreeTier);
        }

        let changed = conn.execute(
            "UPDATE api_keys SET
                balance_usd = balance_usd - ?1,
                total_requests = total_requests + 1,
                total_spent_usd = total_spent_usd + ?1,
                total_saved_usd = total_saved_usd + ?2,
                last_used_at = ?3
             WHERE id = ?4 AND balance_usd >= ?1",
            params![cost_usd, saved_usd, now, key_id],
        )?;
        if changed > 0 {
            return Ok(DeductOutcome::Balance);
        }

        tracing::warn!(key_id, cost_usd, "deduction found no funds, nothing charged");
        Ok(DeductOutcome::Unfunded)
    }

    /// Credit a key's prepaid balance. Returns false for unknown keys.
    pub fn add_balance(&self, key_id: i64, amount_usd: f64) -> Result<bool> {
        let conn = lock_conn(&self.conn)?;
        let changed = conn.execute(
            "UPDATE api_keys SET balance_usd = balance_usd + ?1 WHERE id = ?2",
            params![amount_usd, key_id],
        )?;
        Ok(changed > 0)
    }

    /// Delete a key. Returns false if it did not exist.
    pub fn revoke(&self, key_id: i64) -> Result<bool> {
        let conn = lock_conn(&self.conn)?;
        let changed = conn.execute("DELETE FROM api_keys WHERE id = ?1", [key_id])?;
        Ok(changed > 0)
    }

    /// Delete keys unused for `days` days (or never used and older than
    /// that). Returns the number removed.
    pub fn purge_inactive(&self, days: u32) -> Result<usize> {
        let cutoff = iso_days_ago(days);
        let conn = lock_conn(&self.conn)?;
        let removed = conn.execute(
            "DELETE FROM api_keys
             WHERE (last_used_at IS NOT NULL AND last_used_at < ?1)
                OR (last_used_at IS NULL AND created_at < ?1)",
            [&cutoff],
        )?;
        if removed > 0 {
            tracing::info!(removed, days, "purged inactive API keys");
        }
        Ok(removed)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = lock_conn(&self.conn)?;
        let count = conn.query_row("SELECT COUNT(*) FROM api_keys", [], |row| row.get(0))?;
        Ok(count)
    }
}

const COLUMNS: &str = "id, key_prefix, wallet_address, label, identity_tier, balance_usd, \
     free_requests_remaining, total_requests, total_spent_usd, total_saved_usd, \
     created_at, last_used_at";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ApiKeyRecord> {
    let tier: String = row.get(4)?;
    Ok(ApiKeyRecord {
        id: row.get(0)?,
        key_prefix: row.get(1)?,
        wallet_address: row.get(2)?,
        label: row.get(3)?,
        identity_tier: IdentityTier::parse(&tier).unwrap_or_default(),
        balance_usd: row.get(5)?,
        free_requests_remaining: row.get(6)?,
        total_requests: row.get(7)?,
        total_spent_usd: row.get(8)?,
        total_saved_usd: row.get(9)?,
        created_at: row.get(10)?,
        last_used_at: row.get(11)?,
    })
}

/// Generate a fresh key: `wf_` plus 32 random bytes, base64url.
fn generate_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", API_KEY_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

/// SHA-256 of the full key, hex encoded.
fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}
