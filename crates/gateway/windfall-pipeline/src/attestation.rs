//! Green-compute attestations.
//!
//! Every served request produces an [`AttestationData`] record tying
//! the completion to the energy conditions it ran under. Records go to
//! an [`AttestationSink`]; the production sink posts location proofs to
//! EAS on Base, batching submissions to amortize gas. Submission is
//! best-effort and never blocks or fails a request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// One request's worth of energy provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationData {
    /// Unix seconds.
    pub timestamp: u64,
    pub node_id: String,
    pub lat: f64,
    pub lon: f64,
    pub energy_price_per_kwh: f64,
    pub carbon_intensity: f64,
    pub curtailment_active: bool,
    pub model: String,
    /// Request id, or the combined hash of a batch.
    pub response_hash: String,
    /// Requests this record covers; 1 until batched.
    pub request_count: u32,
}

impl AttestationData {
    /// Collapse a batch into one record: the latest entry represents
    /// the batch, the count covers all of it, and the hash commits to
    /// every member.
    pub fn aggregate(batch: &[AttestationData]) -> Option<AttestationData> {
        let latest = batch.last()?;
        let joined = batch
            .iter()
            .map(|a| a.response_hash.as_str())
            .collect::<Vec<_>>()
            .join(",");
        Some(AttestationData {
            request_count: batch.len() as u32,
            response_hash: format!("0x{}", hex::encode(Sha256::digest(joined.as_bytes()))),
            ..latest.clone()
        })
    }
}

/// Submission failure, already reduced to a message; the pipeline only
/// logs it.
#[derive(Debug, Error)]
#[error("attestation submission failed: {0}")]
pub struct AttestationError(pub String);

/// Where attestation records go.
#[async_trait]
pub trait AttestationSink: Send + Sync {
    async fn submit(&self, data: AttestationData) -> Result<(), AttestationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, ts: u64) -> AttestationData {
        AttestationData {
            timestamp: ts,
            node_id: "wf-helsinki".to_string(),
            lat: 60.17,
            lon: 24.94,
            energy_price_per_kwh: 0.031,
            carbon_intensity: 45.0,
            curtailment_active: false,
            model: "deepseek/deepseek-chat-v3-0324".to_string(),
            response_hash: id.to_string(),
            request_count: 1,
        }
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let value = serde_json::to_value(record("r1", 1_700_000_000)).unwrap();
        assert!(value.get("nodeId").is_some());
        assert!(value.get("energyPricePerKwh").is_some());
        assert!(value.get("responseHash").is_some());
        assert!(value.get("requestCount").is_some());
    }

    #[test]
    fn test_aggregate_uses_latest_and_counts_all() {
        let batch = vec![record("r1", 100), record("r2", 200), record("r3", 300)];
        let combined = AttestationData::aggregate(&batch).unwrap();

        assert_eq!(combined.timestamp, 300);
        assert_eq!(combined.request_count, 3);
        assert!(combined.response_hash.starts_with("0x"));
        assert_eq!(combined.response_hash.len(), 66);
        assert_ne!(combined.response_hash, "r3");
    }

    #[test]
    fn test_aggregate_is_order_sensitive() {
        let forward = AttestationData::aggregate(&[record("a", 1), record("b", 2)]).unwrap();
        let reversed = AttestationData::aggregate(&[record("b", 2), record("a", 1)]).unwrap();
        assert_ne!(forward.response_hash, reversed.response_hash);
    }

    #[test]
    fn test_aggregate_empty_batch() {
        assert!(AttestationData::aggregate(&[]).is_none());
    }
}
