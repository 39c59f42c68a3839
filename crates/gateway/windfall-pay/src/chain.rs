//! Base chain access over JSON-RPC.
//!
//! The verifier needs exactly two reads: the transaction itself (for
//! native ETH transfers) and its receipt (for USDC `Transfer` logs).
//! Both go through the [`ChainRpc`] trait so tests can serve canned
//! transactions without a node.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::RpcError;

/// Default HTTP timeout for RPC calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Public RPC endpoint for Base mainnet.
pub const DEFAULT_BASE_RPC_URL: &str = "https://mainnet.base.org";

/// A transaction as reported by `eth_getTransactionByHash`.
///
/// Addresses and hashes are lowercased on ingestion; every comparison
/// downstream is on lowercased strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
    pub hash: String,
    pub from: String,
    /// `None` for contract creations.
    pub to: Option<String>,
    /// Native value in wei.
    pub value_wei: u128,
}

/// One log entry from a transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLog {
    /// Emitting contract address, lowercased.
    pub address: String,
    pub topics: Vec<String>,
    /// ABI-encoded event data, 0x-prefixed.
    pub data: String,
}

/// A mined transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    /// Whether execution succeeded.
    pub status: bool,
    pub logs: Vec<TransferLog>,
}

/// Read access to payment transactions on the chain.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Fetch a transaction by hash. `None` means the node has never
    /// seen the hash.
    async fn transaction(&self, tx_hash: &str) -> Result<Option<ChainTransaction>, RpcError>;

    /// Fetch the receipt for a transaction. `None` means not mined yet.
    async fn receipt(&self, tx_hash: &str) -> Result<Option<ChainReceipt>, RpcError>;
}

/// JSON-RPC 2.0 client for a Base node.
#[derive(Clone)]
pub struct BaseRpcClient {
    client: Client,
    rpc_url: String,
}

impl BaseRpcClient {
    /// Create a client against the given RPC endpoint.
    pub fn new(rpc_url: &str) -> Result<Self, RpcError> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
        })
    }

    /// The endpoint this client talks to.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        debug!(method, url = %self.rpc_url, "Base RPC call");
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response: RpcEnvelope = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(RpcError::Node {
                code: err.code,
                message: err.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChainRpc for BaseRpcClient {
    async fn transaction(&self, tx_hash: &str) -> Result<Option<ChainTransaction>, RpcError> {
        let result = self
            .call("eth_getTransactionByHash", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let raw: RawTransaction = serde_json::from_value(result)
            .map_err(|e| RpcError::invalid_response(format!("transaction body: {e}")))?;
        Ok(Some(raw.try_into()?))
    }

    async fn receipt(&self, tx_hash: &str) -> Result<Option<ChainReceipt>, RpcError> {
        let result = self
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let raw: RawReceipt = serde_json::from_value(result)
            .map_err(|e| RpcError::invalid_response(format!("receipt body: {e}")))?;
        Ok(Some(raw.into()))
    }
}

impl std::fmt::Debug for BaseRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseRpcClient")
            .field("rpc_url", &self.rpc_url)
            .finish()
    }
}

/// Parse a 0x-prefixed hex quantity. Returns `None` for malformed hex
/// or values past `u128::MAX`; zero-length data (`"0x"`) reads as zero.
pub fn parse_hex_quantity(hex: &str) -> Option<u128> {
    let digits = hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X"))?;
    if digits.is_empty() {
        return Some(0);
    }
    // Leading zeros from 32-byte ABI padding are fine; only the value
    // itself must fit.
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        return Some(0);
    }
    u128::from_str_radix(trimmed, 16).ok()
}

// ===== Wire formats =====

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    hash: String,
    from: String,
    to: Option<String>,
    value: String,
}

impl TryFrom<RawTransaction> for ChainTransaction {
    type Error = RpcError;

    fn try_from(raw: RawTransaction) -> Result<Self, RpcError> {
        let value_wei = parse_hex_quantity(&raw.value)
            .ok_or_else(|| RpcError::invalid_response(format!("tx value: {}", raw.value)))?;
        Ok(ChainTransaction {
            hash: raw.hash.to_lowercase(),
            from: raw.from.to_lowercase(),
            to: raw.to.map(|a| a.to_lowercase()),
            value_wei,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawReceipt {
    status: Option<String>,
    #[serde(default)]
    logs: Vec<RawLog>,
}

#[derive(Debug, Deserialize)]
struct RawLog {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
}

impl From<RawReceipt> for ChainReceipt {
    fn from(raw: RawReceipt) -> Self {
        let status = raw
            .status
            .as_deref()
            .and_then(parse_hex_quantity)
            .map(|s| s == 1)
            .unwrap_or(false);
        ChainReceipt {
            status,
            logs: raw
                .logs
                .into_iter()
                .map(|log| TransferLog {
                    address: log.address.to_lowercase(),
                    topics: log.topics,
                    data: log.data,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x0"), Some(0));
        assert_eq!(parse_hex_quantity("0x"), Some(0));
        assert_eq!(parse_hex_quantity("0x3e8"), Some(1000));
        assert_eq!(parse_hex_quantity("0x0de0b6b3a7640000"), Some(1_000_000_000_000_000_000));
        // 32-byte ABI-padded USDC amount (1.50 USDC = 1_500_000 atomic)
        assert_eq!(
            parse_hex_quantity(
                "0x000000000000000000000000000000000000000000000000000000000016e360"
            ),
            Some(1_500_000)
        );
        assert_eq!(parse_hex_quantity("3e8"), None);
        assert_eq!(parse_hex_quantity("0xzz"), None);
        // 33 f's exceeds u128
        assert_eq!(
            parse_hex_quantity("0xfffffffffffffffffffffffffffffffff"),
            None
        );
    }

    #[test]
    fn test_transaction_conversion_lowercases() {
        let raw = RawTransaction {
            hash: "0xABCD".to_string(),
            from: "0xFfFf1234567890abcdef1234567890abcdef1234".to_string(),
            to: Some("0xAAAA567890abcdef1234567890abcdef12345678".to_string()),
            value: "0x2386f26fc10000".to_string(),
        };
        let tx = ChainTransaction::try_from(raw).unwrap();
        assert_eq!(tx.hash, "0xabcd");
        assert_eq!(tx.from, "0xffff1234567890abcdef1234567890abcdef1234");
        assert_eq!(
            tx.to.as_deref(),
            Some("0xaaaa567890abcdef1234567890abcdef12345678")
        );
        assert_eq!(tx.value_wei, 10_000_000_000_000_000);
    }

    #[test]
    fn test_transaction_conversion_rejects_bad_value() {
        let raw = RawTransaction {
            hash: "0x1".to_string(),
            from: "0x2".to_string(),
            to: None,
            value: "garbage".to_string(),
        };
        assert!(ChainTransaction::try_from(raw).is_err());
    }

    #[test]
    fn test_receipt_status_parsing() {
        let ok: RawReceipt = serde_json::from_value(json!({
            "status": "0x1",
            "logs": [],
        }))
        .unwrap();
        assert!(ChainReceipt::from(ok).status);

        let reverted: RawReceipt = serde_json::from_value(json!({
            "status": "0x0",
            "logs": [],
        }))
        .unwrap();
        assert!(!ChainReceipt::from(reverted).status);

        // Pre-Byzantium receipts carry no status field.
        let missing: RawReceipt = serde_json::from_value(json!({ "logs": [] })).unwrap();
        assert!(!ChainReceipt::from(missing).status);
    }

    #[test]
    fn test_receipt_log_conversion() {
        let raw: RawReceipt = serde_json::from_value(json!({
            "status": "0x1",
            "logs": [{
                "address": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
                "topics": ["0xddf2", "0x00aa", "0x00bb"],
                "data": "0x016e360",
            }],
        }))
        .unwrap();
        let receipt = ChainReceipt::from(raw);
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(
            receipt.logs[0].address,
            "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
        );
        assert_eq!(receipt.logs[0].topics.len(), 3);
    }

    #[test]
    fn test_client_creation() {
        let client = BaseRpcClient::new(DEFAULT_BASE_RPC_URL).unwrap();
        assert_eq!(client.rpc_url(), "https://mainnet.base.org");
    }
}
