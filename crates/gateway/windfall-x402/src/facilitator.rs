//! x402 facilitator client.
//!
//! Communicates with a CDP-compatible facilitator for payment
//! verification and settlement. The facilitator handles:
//! - Verifying EIP-3009 authorization signatures
//! - Submitting the transfer on-chain
//! - Paying gas fees on behalf of the client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::{X402Error, X402Result};
use crate::types::{
    PaymentPayload, PaymentRequirement, SettleRequest, SettleResponse, VerifyRequest,
    VerifyResponse, X402Config, X402_VERSION,
};

/// Default HTTP timeout for facilitator requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Verification and settlement backend for the payment gate.
///
/// The production implementation is [`FacilitatorClient`]; tests swap in
/// an in-process fake.
#[async_trait]
pub trait Facilitator: Send + Sync {
    /// Verify a payment payload against the requirements.
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirement,
    ) -> X402Result<VerifyResponse>;

    /// Settle a verified payment on-chain.
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirement,
    ) -> X402Result<SettleResponse>;
}

/// HTTP client for an x402 facilitator (x402.org, Coinbase CDP, ...).
#[derive(Clone)]
pub struct FacilitatorClient {
    /// HTTP client
    client: Client,
    /// Base URL of the facilitator
    base_url: String,
}

impl FacilitatorClient {
    /// Create a new facilitator client.
    pub fn new(facilitator_url: &str) -> X402Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| {
                X402Error::FacilitatorNetwork(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: facilitator_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from an x402 config.
    pub fn from_config(config: &X402Config) -> X402Result<Self> {
        Self::new(&config.facilitator_url)
    }

    /// Get the facilitator's base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Facilitator for FacilitatorClient {
    /// The facilitator checks:
    /// - The EIP-712 signature matches the authorization
    /// - Amount meets requirements
    /// - The payer holds sufficient USDC
    /// - The authorization has not been used on-chain
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirement,
    ) -> X402Result<VerifyResponse> {
        let url = format!("{}/verify", self.base_url);
        debug!(url = %url, "Verifying payment with facilitator");

        let request = VerifyRequest {
            x402_version: X402_VERSION,
            payment_payload: payload.clone(),
            payment_requirements: requirements.clone(),
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(X402Error::VerificationFailed {
                reason: format!("facilitator returned {}: {}", status, body),
            });
        }

        let verify_response: VerifyResponse =
            response
                .json()
                .await
                .map_err(|e| X402Error::VerificationFailed {
                    reason: format!("failed to parse verify response: {}", e),
                })?;

        if verify_response.is_valid {
            debug!(payer = ?verify_response.payer, "Payment verified successfully");
        } else {
            warn!(
                reason = ?verify_response.invalid_reason,
                "Payment verification failed"
            );
        }

        Ok(verify_response)
    }

    /// The facilitator:
    /// 1. Wraps the authorization in a `transferWithAuthorization` call
    /// 2. Submits it on-chain, paying gas itself
    /// 3. Returns the transaction hash
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirement,
    ) -> X402Result<SettleResponse> {
        let url = format!("{}/settle", self.base_url);
        debug!(url = %url, "Settling payment with facilitator");

        let request = SettleRequest {
            x402_version: X402_VERSION,
            payment_payload: payload.clone(),
            payment_requirements: requirements.clone(),
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(X402Error::SettlementFailed {
                reason: format!("facilitator returned {}: {}", status, body),
            });
        }

        let settle_response: SettleResponse =
            response
                .json()
                .await
                .map_err(|e| X402Error::SettlementFailed {
                    reason: format!("failed to parse settle response: {}", e),
                })?;

        if settle_response.success {
            info!(
                transaction = ?settle_response.transaction,
                network = ?settle_response.network,
                "Payment settled successfully"
            );
        } else {
            warn!(
                error = ?settle_response.error_reason,
                "Payment settlement failed"
            );
        }

        Ok(settle_response)
    }
}

impl std::fmt::Debug for FacilitatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = FacilitatorClient::new("https://x402.org/facilitator");
        assert!(client.is_ok());

        let client = client.unwrap();
        assert_eq!(client.base_url(), "https://x402.org/facilitator");
    }

    #[test]
    fn test_client_url_normalization() {
        let client = FacilitatorClient::new("https://x402.org/facilitator/").unwrap();
        assert_eq!(client.base_url(), "https://x402.org/facilitator");
    }

    #[test]
    fn test_client_from_config() {
        let config = X402Config::mainnet("0x1234567890abcdef1234567890abcdef12345678");
        let client = FacilitatorClient::from_config(&config);
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_debug() {
        let client = FacilitatorClient::new("https://example.com/v1").unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("example.com"));
    }
}
