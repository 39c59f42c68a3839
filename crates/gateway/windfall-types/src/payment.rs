//! The resolved payment method for a request.
//!
//! Payment resolution runs once per request and produces exactly one
//! of these variants. The pipeline later bills according to the
//! variant; nothing downstream re-opens the decision.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token kind of a verified onchain transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "USDC")]
    Usdc,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Eth => "ETH",
            TransferKind::Usdc => "USDC",
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A confirmed onchain transfer credited to the gateway wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedTransfer {
    pub kind: TransferKind,
    /// Lowercased transaction hash.
    pub tx_hash: String,
    /// Lowercased sender address.
    pub from: String,
    /// USD value credited, at the price observed during verification.
    pub amount_usd: f64,
}

/// Which free quota a free-tier resolution drew from.
#[derive(Debug, Clone, PartialEq)]
pub enum FreeTierAccount {
    /// Per-wallet quota keyed by lowercased address.
    Wallet(String),
    /// Per-key quota granted at key creation.
    ApiKey(i64),
    /// The forwarding entry node already billed this request; nothing
    /// is consumed here.
    Proxied,
}

/// How one request is paid for.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentResolution {
    /// No-charge request drawn from a free quota.
    FreeTier { account: FreeTierAccount },
    /// Debited from a prepaid API key balance after execution.
    ApiKeyBalance { key_id: i64, amount_usd: f64 },
    /// Paid up front by a verified native ETH transfer.
    EthTransfer {
        tx_hash: String,
        payer: String,
        amount_usd: f64,
    },
    /// Paid up front by a verified USDC transfer.
    UsdcTransfer {
        tx_hash: String,
        payer: String,
        amount_usd: f64,
    },
    /// Paid through the x402 facilitator flow.
    X402 {
        /// Settlement transaction hash reported by the facilitator.
        transaction: String,
        payer: String,
        amount_usd: f64,
    },
    /// Nothing resolved. Only observable before the payment stage
    /// finishes; a request never executes in this state.
    None,
}

impl PaymentResolution {
    /// Build the matching resolution for a verified onchain transfer.
    pub fn from_transfer(transfer: VerifiedTransfer) -> Self {
        match transfer.kind {
            TransferKind::Eth => PaymentResolution::EthTransfer {
                tx_hash: transfer.tx_hash,
                payer: transfer.from,
                amount_usd: transfer.amount_usd,
            },
            TransferKind::Usdc => PaymentResolution::UsdcTransfer {
                tx_hash: transfer.tx_hash,
                payer: transfer.from,
                amount_usd: transfer.amount_usd,
            },
        }
    }

    /// Stable method name recorded in the request log and revenue
    /// ledger.
    pub fn method_name(&self) -> &'static str {
        match self {
            PaymentResolution::FreeTier { .. } => "free_tier",
            PaymentResolution::ApiKeyBalance { .. } => "api_key_balance",
            PaymentResolution::EthTransfer { .. } => "eth_transfer",
            PaymentResolution::UsdcTransfer { .. } => "usdc_transfer",
            PaymentResolution::X402 { .. } => "x402",
            PaymentResolution::None => "none",
        }
    }

    /// USD amount collected up front or owed at deduction time.
    pub fn amount_usd(&self) -> f64 {
        match self {
            PaymentResolution::ApiKeyBalance { amount_usd, .. }
            | PaymentResolution::EthTransfer { amount_usd, .. }
            | PaymentResolution::UsdcTransfer { amount_usd, .. }
            | PaymentResolution::X402 { amount_usd, .. } => *amount_usd,
            PaymentResolution::FreeTier { .. } | PaymentResolution::None => 0.0,
        }
    }

    /// Transaction hash backing the payment, if onchain.
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            PaymentResolution::EthTransfer { tx_hash, .. }
            | PaymentResolution::UsdcTransfer { tx_hash, .. } => Some(tx_hash),
            PaymentResolution::X402 { transaction, .. } => Some(transaction),
            _ => None,
        }
    }

    /// Whether revenue should be recorded for this payment. Free tier
    /// and unresolved requests produce none.
    pub fn is_revenue(&self) -> bool {
        !matches!(
            self,
            PaymentResolution::FreeTier { .. } | PaymentResolution::None
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names() {
        let free = PaymentResolution::FreeTier {
            account: FreeTierAccount::Wallet("0xabc".to_string()),
        };
        assert_eq!(free.method_name(), "free_tier");

        let balance = PaymentResolution::ApiKeyBalance {
            key_id: 1,
            amount_usd: 0.002,
        };
        assert_eq!(balance.method_name(), "api_key_balance");
        assert_eq!(PaymentResolution::None.method_name(), "none");
    }

    #[test]
    fn test_from_transfer_separates_token_kinds() {
        let eth = PaymentResolution::from_transfer(VerifiedTransfer {
            kind: TransferKind::Eth,
            tx_hash: "0xaa".to_string(),
            from: "0xbb".to_string(),
            amount_usd: 0.01,
        });
        assert_eq!(eth.method_name(), "eth_transfer");

        let usdc = PaymentResolution::from_transfer(VerifiedTransfer {
            kind: TransferKind::Usdc,
            tx_hash: "0xcc".to_string(),
            from: "0xdd".to_string(),
            amount_usd: 0.01,
        });
        assert_eq!(usdc.method_name(), "usdc_transfer");
        assert_eq!(usdc.tx_hash(), Some("0xcc"));
    }

    #[test]
    fn test_revenue_excludes_free_and_none() {
        let free = PaymentResolution::FreeTier {
            account: FreeTierAccount::Proxied,
        };
        assert!(!free.is_revenue());
        assert!(!PaymentResolution::None.is_revenue());

        let x402 = PaymentResolution::X402 {
            transaction: "0x1".to_string(),
            payer: "0x2".to_string(),
            amount_usd: 0.002,
        };
        assert!(x402.is_revenue());
    }

    #[test]
    fn test_amounts() {
        let free = PaymentResolution::FreeTier {
            account: FreeTierAccount::ApiKey(3),
        };
        assert_eq!(free.amount_usd(), 0.0);

        let eth = PaymentResolution::EthTransfer {
            tx_hash: "0x1".to_string(),
            payer: "0x2".to_string(),
            amount_usd: 0.05,
        };
        assert_eq!(eth.amount_usd(), 0.05);
    }
}
