//! Request and revenue records.
//!
//! Every served request appends one row to `request_log`; every paid
//! request appends one to `revenue`. Wallet addresses in old log rows
//! are overwritten with a fixed marker after the retention window.

use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::{iso_days_ago, lock_conn, now_iso};

/// Marker written over wallet addresses past the retention window.
const ANONYMIZED: &str = "anonymized";

/// One served request, ready to log.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    /// Gateway-assigned request id.
    pub id: String,
    /// Wallet or wallet-like label of the payer.
    pub wallet_address: String,
    pub node_id: String,
    pub model: String,
    pub mode: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub energy_price_kwh: f64,
    pub carbon_intensity: f64,
    pub cost_usd: f64,
    pub payment_method: String,
    pub response_time_ms: u64,
    pub attestation_uid: Option<String>,
}

/// Aggregate usage statistics for the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct UsageStats {
    pub total_requests: i64,
    pub total_revenue_usd: f64,
    /// Distinct wallets seen in the request log.
    pub unique_agents: i64,
    /// Wallets that have consumed free tier requests.
    pub free_agents: i64,
    /// Distinct wallets with at least one paid request.
    pub paid_agents: i64,
    pub requests_24h: i64,
    pub revenue_24h_usd: f64,
    /// Request counts per node.
    pub by_node: Vec<(String, i64)>,
    /// Top models by request count, at most ten.
    pub by_model: Vec<(String, i64)>,
    /// Request counts per routing mode.
    pub by_mode: Vec<(String, i64)>,
}

/// SQLite-backed request and revenue log.
#[derive(Clone)]
pub struct RequestLogStore {
    conn: Arc<Mutex<Connection>>,
}

impl RequestLogStore {
    /// Create a new request log with the given database connection.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Append a request record.
    pub fn insert(&self, record: &RequestRecord) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT INTO request_log
                (id, timestamp, wallet_address, node_id, model, mode,
                 input_tokens, output_tokens, energy_price_kwh, carbon_intensity,
                 cost_usd, payment_method, response_time_ms, attestation_uid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                record.id,
                now_iso(),
                record.wallet_address.to_lowercase(),
                record.node_id,
                record.model,
                record.mode,
                record.input_tokens,
                record.output_tokens,
                record.energy_price_kwh,
                record.carbon_intensity,
                record.cost_usd,
                record.payment_method,
                record.response_time_ms,
                record.attestation_uid,
            ],
        )?;
        Ok(())
    }

    /// Append a revenue record.
    pub fn log_revenue(
        &self,
        wallet_address: &str,
        amount_usd: f64,
        payment_method: &str,
        tx_hash: Option<&str>,
    ) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT INTO revenue (timestamp, wallet_address, amount_usd, payment_method, tx_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                now_iso(),
                wallet_address.to_lowercase(),
                amount_usd,
                payment_method,
                tx_hash,
            ],
        )?;
        Ok(())
    }

    /// Overwrite wallet addresses on log rows older than `days` days.
    /// Returns the number of rows rewritten.
    pub fn anonymize_older_than(&self, days: u32) -> Result<usize> {
        let cutoff = iso_days_ago(days);
        let conn = lock_conn(&self.conn)?;
        let changed = conn.execute(
            "UPDATE request_log SET wallet_address = ?1
             WHERE timestamp < ?2 AND wallet_address != ?1",
            params![ANONYMIZED, cutoff],
        )?;
        if changed > 0 {
            tracing::info!(changed, days, "anonymized old request log rows");
        }
        Ok(changed)
    }

    /// Aggregate usage and revenue statistics.
    pub fn usage_stats(&self) -> Result<UsageStats> {
        let day_ago = iso_days_ago(1);
        let conn = lock_conn(&self.conn)?;

        let total_requests: i64 =
            conn.query_row("SELECT COUNT(*) FROM request_log", [], |row| row.get(0))?;
        let total_revenue_usd: f64 = conn.query_row(
            "SELECT COALESCE(SUM(amount_usd), 0) FROM revenue",
            [],
            |row| row.get(0),
        )?;
        let unique_agents: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT wallet_address) FROM request_log",
            [],
            |row| row.get(0),
        )?;
        let free_agents: i64 =
            conn.query_row("SELECT COUNT(*) FROM free_tier", [], |row| row.get(0))?;
        let paid_agents: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT wallet_address) FROM request_log
             WHERE payment_method NOT IN ('free_tier', 'none', 'cache_hit')",
            [],
            |row| row.get(0),
        )?;
        let requests_24h: i64 = conn.query_row(
            "SELECT COUNT(*) FROM request_log WHERE timestamp > ?1",
            [&day_ago],
            |row| row.get(0),
        )?;
        let revenue_24h_usd: f64 = conn.query_row(
            "SELECT COALESCE(SUM(amount_usd), 0) FROM revenue WHERE timestamp > ?1",
            [&day_ago],
            |row| row.get(0),
        )?;

        let by_node = group_counts(&conn, "node_id", None)?;
        let by_model = group_counts(&conn, "model", Some(10))?;
        let by_mode = group_counts(&conn, "mode", None)?;

        Ok(UsageStats {
            total_requests,
            total_revenue_usd,
            unique_agents,
            free_agents,
            paid_agents,
            requests_24h,
            revenue_24h_usd,
            by_node,
            by_model,
            by_mode,
        })
    }
}

fn group_counts(
    conn: &Connection,
    column: &str,
    limit: Option<u32>,
) -> Result<Vec<(String, i64)>> {
    let limit_clause = match limit {
        Some(n) => format!(" LIMIT {n}"),
        None => String::new(),
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) AS n FROM request_log GROUP BY {column} ORDER BY n DESC{limit_clause}"
    ))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
