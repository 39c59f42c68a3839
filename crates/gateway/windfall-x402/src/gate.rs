//! Payment gate for x402-protected inference.
//!
//! The `PaymentGate` handles the x402 flow for the completions endpoint:
//! 1. Decode the PAYMENT-SIGNATURE header
//! 2. Validate the payment locally (scheme, network, amount, timing, recipient)
//! 3. Reject replayed nonces
//! 4. Verify, then settle, via the facilitator

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{X402Error, X402Result};
use crate::facilitator::{Facilitator, FacilitatorClient};
use crate::types::{usd_to_atomic, PaymentPayload, PaymentRequired, X402Config};

/// A payment that has been verified and settled on-chain.
#[derive(Debug, Clone)]
pub struct SettledX402 {
    /// Settlement transaction hash, when the facilitator reported one.
    pub transaction: Option<String>,

    /// Who paid.
    pub payer: String,

    /// Network the settlement occurred on.
    pub network: String,
}

/// Payment gate managing the x402 flow for a gateway node.
pub struct PaymentGate {
    /// x402 configuration.
    config: X402Config,

    /// Facilitator for verification and settlement.
    facilitator: Option<Arc<dyn Facilitator>>,

    /// Used nonces for replay prevention.
    used_nonces: Arc<RwLock<HashSet<String>>>,
}

impl PaymentGate {
    /// Create a new payment gate from configuration.
    pub fn new(config: X402Config) -> X402Result<Self> {
        let facilitator: Option<Arc<dyn Facilitator>> = if config.enabled {
            Some(Arc::new(FacilitatorClient::from_config(&config)?))
        } else {
            None
        };

        Ok(Self {
            config,
            facilitator,
            used_nonces: Arc::new(RwLock::new(HashSet::new())),
        })
    }

    /// Create a disabled payment gate (no x402).
    pub fn disabled() -> Self {
        Self {
            config: X402Config::default(),
            facilitator: None,
            used_nonces: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Replace the facilitator. Used by tests and custom deployments.
    pub fn with_facilitator(mut self, facilitator: Arc<dyn Facilitator>) -> Self {
        self.facilitator = Some(facilitator);
        self
    }

    /// Check if x402 is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Get the current configuration.
    pub fn config(&self) -> &X402Config {
        &self.config
    }

    /// Process an incoming payment for one inference request.
    ///
    /// `price_usd` is the quoted price the client is expected to cover.
    /// Returns settlement details on success; every failure maps to a
    /// 402-style [`X402Error`].
    pub async fn process_payment(
        &self,
        payment_header: &str,
        resource_url: &str,
        price_usd: f64,
    ) -> X402Result<SettledX402> {
        if !self.config.enabled {
            return Err(X402Error::NotConfigured);
        }
        let facilitator = self.facilitator.as_ref().ok_or(X402Error::NotConfigured)?;

        let payload = PaymentPayload::from_header(payment_header)
            .map_err(|e| X402Error::MalformedPayload { reason: e })?;

        self.validate_payload(&payload, price_usd)?;
        self.check_nonce(&payload.payload.authorization.nonce).await?;

        let required = PaymentRequired::for_inference(
            resource_url,
            "LLM inference",
            price_usd,
            &self.config,
        );
        let requirement = &required.accepts[0];

        let verify_result = facilitator.verify(&payload, requirement).await?;
        if !verify_result.is_valid {
            return Err(X402Error::VerificationFailed {
                reason: verify_result
                    .invalid_reason
                    .unwrap_or_else(|| "unknown verification failure".to_string()),
            });
        }

        let settle_result = facilitator.settle(&payload, requirement).await?;
        if !settle_result.success {
            return Err(X402Error::SettlementFailed {
                reason: settle_result
                    .error_reason
                    .unwrap_or_else(|| "unknown settlement failure".to_string()),
            });
        }

        self.mark_nonce_used(&payload.payload.authorization.nonce)
            .await;

        let payer = settle_result
            .payer
            .or(verify_result.payer)
            .unwrap_or_else(|| payload.payload.authorization.from.clone());
        let network = settle_result
            .network
            .unwrap_or_else(|| self.config.network.clone());

        info!(
            payer = %payer,
            transaction = ?settle_result.transaction,
            amount_usd = price_usd,
            "x402 payment settled"
        );

        Ok(SettledX402 {
            transaction: settle_result.transaction,
            payer,
            network,
        })
    }

    /// Validate a payment payload locally before involving the facilitator.
    fn validate_payload(&self, payload: &PaymentPayload, price_usd: f64) -> X402Result<()> {
        if payload.scheme != "exact" {
            return Err(X402Error::UnsupportedScheme {
                scheme: payload.scheme.clone(),
            });
        }

        if payload.network != self.config.network {
            return Err(X402Error::UnsupportedNetwork {
                network: payload.network.clone(),
            });
        }

        let authorization = &payload.payload.authorization;

        let received: u64 =
            authorization
                .value
                .parse()
                .map_err(|_| X402Error::MalformedPayload {
                    reason: format!("invalid amount: {}", authorization.value),
                })?;
        let required = usd_to_atomic(price_usd);
        if received < required {
            return Err(X402Error::InsufficientPayment { required, received });
        }

        let now = current_timestamp();

        let valid_after: u64 = authorization.valid_after.parse().unwrap_or(0);
        if now < valid_after {
            return Err(X402Error::PaymentNotYetValid { valid_after });
        }

        let valid_before: u64 = authorization.valid_before.parse().unwrap_or(u64::MAX);
        if now > valid_before {
            return Err(X402Error::PaymentExpired {
                expired_at: valid_before,
            });
        }

        if !authorization.to.eq_ignore_ascii_case(&self.config.pay_to) {
            return Err(X402Error::MalformedPayload {
                reason: format!(
                    "wrong recipient: expected {}, got {}",
                    self.config.pay_to, authorization.to
                ),
            });
        }

        Ok(())
    }

    /// Check if a nonce has been used before.
    async fn check_nonce(&self, nonce: &str) -> X402Result<()> {
        let nonces = self.used_nonces.read().await;
        if nonces.contains(nonce) {
            return Err(X402Error::NonceReused {
                nonce: nonce.to_string(),
            });
        }
        Ok(())
    }

    /// Mark a nonce as used.
    async fn mark_nonce_used(&self, nonce: &str) {
        let mut nonces = self.used_nonces.write().await;
        nonces.insert(nonce.to_string());

        // The on-chain EIP-3009 nonce check is the real replay guard;
        // this set only short-circuits before a facilitator round trip,
        // so dropping it on overflow is safe.
        if nonces.len() > 100_000 {
            debug!("Pruning nonce set (exceeded 100k entries)");
            nonces.clear();
        }
    }

    /// Get x402 status summary.
    pub fn status(&self) -> X402Status {
        X402Status {
            enabled: self.config.enabled,
            network: self.config.network.clone(),
            facilitator_url: self.config.facilitator_url.clone(),
            pay_to: self.config.pay_to.clone(),
            asset: self.config.asset.clone(),
        }
    }
}

/// x402 status summary for reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X402Status {
    pub enabled: bool,
    pub network: String,
    pub facilitator_url: String,
    pub pay_to: String,
    pub asset: String,
}

/// Get the current Unix timestamp in seconds.
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
