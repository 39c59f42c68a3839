//! Onchain payment verification for tx-hash payments.
//!
//! A client that cannot speak x402 can pay by sending ETH or USDC to
//! the gateway wallet on Base and quoting the transaction hash in
//! `X-Payment-TX`. The verifier confirms the transaction landed, pays
//! our wallet, and meets the price, then claims the hash so it cannot
//! be replayed.
//!
//! Rejection reasons are client-facing text; they go straight into the
//! 402 response body.

use std::sync::Arc;

use tracing::{debug, info};
use windfall_store::TxLedgerStore;
use windfall_types::{TransferKind, VerifiedTransfer};

use crate::chain::{parse_hex_quantity, ChainReceipt, ChainRpc};
use crate::error::{PayError, PayResult};
use crate::price::EthPriceCache;

/// `keccak256("Transfer(address,address,uint256)")`, the ERC-20
/// Transfer event signature.
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// USDC acceptance floor relative to the quoted price.
const USDC_TOLERANCE: f64 = 0.95;

/// ETH acceptance floor. Looser than USDC because the exchange rate
/// moves between the client sending and the gateway verifying.
const ETH_TOLERANCE: f64 = 0.5;

/// Verifies tx-hash payments against the Base chain.
pub struct OnchainVerifier {
    rpc: Arc<dyn ChainRpc>,
    price: EthPriceCache,
    ledger: TxLedgerStore,
    /// Lowercased gateway receiving wallet.
    wallet_address: String,
    /// Lowercased USDC contract address.
    usdc_address: String,
}

impl OnchainVerifier {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        price: EthPriceCache,
        ledger: TxLedgerStore,
        wallet_address: &str,
        usdc_address: &str,
    ) -> Self {
        Self {
            rpc,
            price,
            ledger,
            wallet_address: wallet_address.to_lowercase(),
            usdc_address: usdc_address.to_lowercase(),
        }
    }

    /// Verify that `tx_hash` pays the gateway wallet at least the
    /// expected amount, in USDC or native ETH.
    ///
    /// USDC is checked first: a transaction can both call a contract
    /// and carry native value, and the USDC `Transfer` log is the
    /// stronger signal of intent. The hash is claimed in the replay
    /// ledger only on acceptance, so a rejected transaction can be
    /// retried after topping up.
    pub async fn verify(&self, tx_hash: &str, expected_usd: f64) -> PayResult<VerifiedTransfer> {
        let hash = tx_hash.to_lowercase();

        if self.ledger.is_used(&hash)? {
            return Err(PayError::rejected("Transaction already used"));
        }

        let tx = match self.rpc.transaction(&hash).await {
            Ok(Some(tx)) => tx,
            Ok(None) => return Err(PayError::rejected("Transaction not found")),
            Err(e) => return Err(PayError::rejected(e.to_string())),
        };

        let receipt = match self.rpc.receipt(&hash).await {
            Ok(Some(receipt)) if receipt.status => receipt,
            Ok(_) => return Err(PayError::rejected("Transaction failed")),
            Err(e) => return Err(PayError::rejected(e.to_string())),
        };

        if let Some(amount_usd) = self.usdc_amount(&receipt) {
            debug!(tx = %hash, amount_usd, "found USDC transfer to gateway wallet");
            if amount_usd < expected_usd * USDC_TOLERANCE {
                return Err(PayError::rejected(format!(
                    "USDC payment too low: ${amount_usd:.4} < ${expected_usd:.4} required"
                )));
            }
            return self.accept(TransferKind::Usdc, hash, tx.from, amount_usd);
        }

        let pays_wallet = tx
            .to
            .as_deref()
            .is_some_and(|to| to.eq_ignore_ascii_case(&self.wallet_address));
        if pays_wallet && tx.value_wei > 0 {
            let eth = tx.value_wei as f64 / 1e18;
            let amount_usd = eth * self.price.current().await;
            if amount_usd < expected_usd * ETH_TOLERANCE {
                return Err(PayError::rejected(format!(
                    "ETH payment too low: ${amount_usd:.4} < ${expected_usd:.4} required"
                )));
            }
            return self.accept(TransferKind::Eth, hash, tx.from, amount_usd);
        }

        Err(PayError::rejected(
            "Transaction does not contain ETH or USDC transfer to Windfall wallet",
        ))
    }

    /// First USDC `Transfer` log paying our wallet, as USD.
    fn usdc_amount(&self, receipt: &ChainReceipt) -> Option<f64> {
        for log in &receipt.logs {
            if !log.address.eq_ignore_ascii_case(&self.usdc_address) {
                continue;
            }
            if log.topics.first().map(String::as_str) != Some(TRANSFER_TOPIC) {
                continue;
            }
            if log.topics.len() < 3 {
                continue;
            }
            // Topic 2 is the 32-byte padded recipient; the address is
            // the last 20 bytes.
            let Some(recipient) = log.topics[2].get(26..) else {
                continue;
            };
            if !format!("0x{recipient}").eq_ignore_ascii_case(&self.wallet_address) {
                continue;
            }
            let Some(atomic) = parse_hex_quantity(&log.data) else {
                continue;
            };
            return Some(atomic as f64 / 1e6);
        }
        None
    }

    fn accept(
        &self,
        kind: TransferKind,
        tx_hash: String,
        from: String,
        amount_usd: f64,
    ) -> PayResult<VerifiedTransfer> {
        // claim() is an atomic insert; of two racing requests quoting
        // the same hash, exactly one wins.
        if !self.ledger.claim(&tx_hash)? {
            return Err(PayError::rejected("Transaction already used"));
        }
        info!(kind = %kind, tx = %tx_hash, amount_usd, "onchain payment accepted");
        Ok(VerifiedTransfer {
            kind,
            tx_hash,
            from: from.to_lowercase(),
            amount_usd,
        })
    }
}

impl std::fmt::Debug for OnchainVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnchainVerifier")
            .field("wallet_address", &self.wallet_address)
            .field("usdc_address", &self.usdc_address)
            .finish()
    }
}
