//! Mock chain access for payment verification tests.
//!
//! [`MockChainRpc`] serves transactions and receipts from in-memory
//! maps; [`MockEthPrice`] pins the ETH/USD rate. Together they let
//! tests run the full transfer verification path without a Base node.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use windfall_pay::{
    ChainReceipt, ChainRpc, ChainTransaction, EthUsdSource, RpcError, TransferLog, TRANSFER_TOPIC,
};

struct MockChainRpcInner {
    transactions: HashMap<String, ChainTransaction>,
    receipts: HashMap<String, ChainReceipt>,
    should_fail: bool,
}

/// A mock implementation of the `ChainRpc` trait for testing.
///
/// Uses `Arc<RwLock<...>>` internally, so it is cheap to clone and all
/// clones share the same state.
#[derive(Clone)]
pub struct MockChainRpc {
    inner: Arc<RwLock<MockChainRpcInner>>,
}

impl Default for MockChainRpc {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainRpc {
    /// Create an empty chain: every lookup returns `None`.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockChainRpcInner {
                transactions: HashMap::new(),
                receipts: HashMap::new(),
                should_fail: false,
            })),
        }
    }

    /// Seed a successful native ETH transfer.
    pub fn with_eth_transfer(self, tx_hash: &str, from: &str, to: &str, value_wei: u128) -> Self {
        {
            let mut inner = self.inner.write().unwrap();
            inner.transactions.insert(
                tx_hash.to_string(),
                ChainTransaction {
                    hash: tx_hash.to_string(),
                    from: from.to_string(),
                    to: Some(to.to_string()),
                    value_wei,
                },
            );
            inner.receipts.insert(
                tx_hash.to_string(),
                ChainReceipt {
                    status: true,
                    logs: vec![],
                },
            );
        }
        self
    }

    /// Seed a successful USDC transfer: a zero-value call to the token
    /// contract whose receipt carries the Transfer event.
    pub fn with_usdc_transfer(
        self,
        tx_hash: &str,
        from: &str,
        usdc_address: &str,
        to: &str,
        amount_atomic: u64,
    ) -> Self {
        {
            let mut inner = self.inner.write().unwrap();
            inner.transactions.insert(
                tx_hash.to_string(),
                ChainTransaction {
                    hash: tx_hash.to_string(),
                    from: from.to_string(),
                    to: Some(usdc_address.to_string()),
                    value_wei: 0,
                },
            );
            inner.receipts.insert(
                tx_hash.to_string(),
                ChainReceipt {
                    status: true,
                    logs: vec![TransferLog {
                        address: usdc_address.to_string(),
                        topics: vec![
                            TRANSFER_TOPIC.to_string(),
                            pad_address(from),
                            pad_address(to),
                        ],
                        data: format!("0x{amount_atomic:064x}"),
                    }],
                },
            );
        }
        self
    }

    /// Seed a transaction whose receipt reports reverted execution.
    pub fn with_reverted_tx(self, tx_hash: &str, from: &str, to: &str) -> Self {
        {
            let mut inner = self.inner.write().unwrap();
            inner.transactions.insert(
                tx_hash.to_string(),
                ChainTransaction {
                    hash: tx_hash.to_string(),
                    from: from.to_string(),
                    to: Some(to.to_string()),
                    value_wei: 0,
                },
            );
            inner.receipts.insert(
                tx_hash.to_string(),
                ChainReceipt {
                    status: false,
                    logs: vec![],
                },
            );
        }
        self
    }

    /// Configure the mock to fail all lookups.
    pub fn with_failure(self) -> Self {
        self.inner.write().unwrap().should_fail = true;
        self
    }

    /// Set the failure mode at runtime.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.inner.write().unwrap().should_fail = should_fail;
    }
}

#[async_trait]
impl ChainRpc for MockChainRpc {
    async fn transaction(&self, tx_hash: &str) -> Result<Option<ChainTransaction>, RpcError> {
        let inner = self.inner.read().unwrap();
        if inner.should_fail {
            return Err(mock_failure());
        }
        Ok(inner.transactions.get(tx_hash).cloned())
    }

    async fn receipt(&self, tx_hash: &str) -> Result<Option<ChainReceipt>, RpcError> {
        let inner = self.inner.read().unwrap();
        if inner.should_fail {
            return Err(mock_failure());
        }
        Ok(inner.receipts.get(tx_hash).cloned())
    }
}

/// Left-pad an address into a 32-byte event topic.
pub fn pad_address(addr: &str) -> String {
    format!("0x{}{}", "0".repeat(24), addr.trim_start_matches("0x"))
}

fn mock_failure() -> RpcError {
    RpcError::Node {
        code: -32000,
        message: "mock: configured to fail".to_string(),
    }
}

/// A fixed ETH/USD price source.
pub struct MockEthPrice(pub f64);

#[async_trait]
impl EthUsdSource for MockEthPrice {
    async fn eth_usd(&self) -> Result<f64, RpcError> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TX: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

    #[tokio::test]
    async fn test_unknown_hash_returns_none() {
        let chain = MockChainRpc::new();
        assert!(chain.transaction(TX).await.unwrap().is_none());
        assert!(chain.receipt(TX).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eth_transfer_seeded() {
        let chain = MockChainRpc::new().with_eth_transfer(TX, "0xaa", "0xbb", 1_000);
        let tx = chain.transaction(TX).await.unwrap().unwrap();
        assert_eq!(tx.value_wei, 1_000);
        assert!(chain.receipt(TX).await.unwrap().unwrap().status);
    }

    #[tokio::test]
    async fn test_usdc_transfer_log_shape() {
        let chain = MockChainRpc::new().with_usdc_transfer(TX, "0xaa", "0xcc", "0xbb", 2_000_000);
        let receipt = chain.receipt(TX).await.unwrap().unwrap();
        let log = &receipt.logs[0];
        assert_eq!(log.topics[0], TRANSFER_TOPIC);
        assert_eq!(log.topics[1], pad_address("0xaa"));
        assert!(log.data.ends_with(&format!("{:x}", 2_000_000)));
    }

    #[tokio::test]
    async fn test_failure_mode() {
        let chain = MockChainRpc::new().with_failure();
        assert!(chain.transaction(TX).await.is_err());
        chain.set_should_fail(false);
        assert!(chain.transaction(TX).await.is_ok());
    }
}
