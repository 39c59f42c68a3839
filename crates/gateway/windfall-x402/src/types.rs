//! x402 protocol types.
//!
//! Implements the x402 specification types for the EVM "exact" payment
//! scheme (EIP-3009 USDC transfers on Base).
//! See: https://github.com/coinbase/x402/blob/main/specs/x402-specification.md

use serde::{Deserialize, Serialize};

/// x402 protocol version.
pub const X402_VERSION: u32 = 2;

/// HTTP header carrying payment requirements (server → client).
pub const HEADER_PAYMENT_REQUIRED: &str = "PAYMENT-REQUIRED";

/// HTTP header carrying the signed payment (client → server).
pub const HEADER_PAYMENT_SIGNATURE: &str = "PAYMENT-SIGNATURE";

/// Alternate payment header used by older x402 clients.
pub const HEADER_X_PAYMENT: &str = "X-PAYMENT";

/// HTTP header confirming settlement (server → client).
pub const HEADER_PAYMENT_RESPONSE: &str = "PAYMENT-RESPONSE";

/// Base network identifiers (CAIP-2 format).
pub const NETWORK_BASE_MAINNET: &str = "eip155:8453";
pub const NETWORK_BASE_SEPOLIA: &str = "eip155:84532";

/// The payment scheme used by Windfall (EVM exact scheme).
pub const SCHEME_EXACT: &str = "exact";

/// USDC contract on Base mainnet.
pub const USDC_ADDRESS_BASE: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

/// USDC contract on Base Sepolia.
pub const USDC_ADDRESS_BASE_SEPOLIA: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

/// Default maximum timeout for payment validity (seconds).
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300; // 5 minutes

/// Public facilitator operated by x402.org.
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// Converts a USD price to atomic USDC units (6 decimals).
pub fn usd_to_atomic(usd: f64) -> u64 {
    (usd * 1_000_000.0).round() as u64
}

// =============================================================================
// Payment Requirements (402 Response)
// =============================================================================

/// Payment requirements returned with a 402 response.
///
/// Sent by the gateway to tell the client how to pay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// x402 protocol version.
    pub x402_version: u32,

    /// Payment requirements the client may satisfy.
    pub accepts: Vec<PaymentRequirement>,
}

/// A single accepted payment method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    /// Payment scheme (e.g., "exact").
    pub scheme: String,

    /// Network identifier (CAIP-2 format, e.g., "eip155:8453").
    pub network: String,

    /// Required payment amount in the asset's smallest unit
    /// (atomic USDC units, 6 decimals).
    pub max_amount_required: String,

    /// URL of the resource being paid for.
    pub resource: String,

    /// Human-readable description.
    pub description: String,

    /// MIME type of the resource.
    pub mime_type: String,

    /// Address payments go to.
    pub pay_to: String,

    /// Maximum time in seconds the payment is valid after creation.
    pub max_timeout_seconds: u64,

    /// Asset contract address (USDC on Base).
    pub asset: String,
}

// =============================================================================
// Payment Payload (Client → Server)
// =============================================================================

/// Payment payload sent by the client in the PAYMENT-SIGNATURE header.
///
/// For the EVM exact scheme this carries a signed EIP-3009
/// `transferWithAuthorization`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// x402 protocol version.
    pub x402_version: u32,

    /// The payment scheme used.
    pub scheme: String,

    /// Network the payment is for.
    pub network: String,

    /// Scheme-specific payment details.
    pub payload: ExactEvmPayload,
}

/// EVM exact-scheme details: a signature over an EIP-3009 authorization.
///
/// The client never broadcasts anything itself; the facilitator submits
/// the authorization on-chain and pays the gas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    /// EIP-712 signature over the authorization (hex-encoded).
    pub signature: String,

    /// The transfer authorization being signed.
    pub authorization: Eip3009Authorization,
}

/// An EIP-3009 `transferWithAuthorization` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    /// Payer's address.
    pub from: String,

    /// Recipient's address.
    pub to: String,

    /// Amount in atomic USDC units.
    pub value: String,

    /// Timestamp after which the transfer is valid (Unix seconds).
    pub valid_after: String,

    /// Timestamp before which the transfer is valid (Unix seconds).
    pub valid_before: String,

    /// Unique nonce preventing replay (hex-encoded 32 bytes).
    pub nonce: String,
}

// =============================================================================
// Facilitator API Types
// =============================================================================

/// Request to the facilitator's /verify endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// x402 protocol version.
    pub x402_version: u32,

    /// The decoded payment payload.
    pub payment_payload: PaymentPayload,

    /// The payment requirements that were sent to the client.
    pub payment_requirements: PaymentRequirement,
}

/// Response from the facilitator's /verify endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Whether the payment is valid.
    pub is_valid: bool,

    /// If invalid, the reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,

    /// Payer's address (for audit).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Request to the facilitator's /settle endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    /// x402 protocol version.
    pub x402_version: u32,

    /// The decoded payment payload.
    pub payment_payload: PaymentPayload,

    /// The payment requirements.
    pub payment_requirements: PaymentRequirement,
}

/// Response from the facilitator's /settle endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether settlement succeeded.
    pub success: bool,

    /// If failed, the error reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    /// Transaction hash on-chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,

    /// Network the settlement occurred on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// Payer's address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

// =============================================================================
// Payment Response (Server → Client after settlement)
// =============================================================================

/// Settlement confirmation included in the PAYMENT-RESPONSE header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    /// Whether payment was successful.
    pub success: bool,

    /// Transaction hash on the settlement network.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,

    /// Network where settlement occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// Payer's address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

// =============================================================================
// Configuration
// =============================================================================

/// x402 configuration for a Windfall gateway node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X402Config {
    /// Whether x402 payments are enabled.
    pub enabled: bool,

    /// Network to accept payments on ("eip155:8453" or "eip155:84532").
    pub network: String,

    /// Facilitator URL.
    pub facilitator_url: String,

    /// Address payments go to (the node operator's wallet).
    pub pay_to: String,

    /// Asset contract to accept (USDC on the configured network).
    pub asset: String,

    /// Maximum payment timeout in seconds.
    pub max_timeout_seconds: u64,
}

impl Default for X402Config {
    fn default() -> Self {
        Self {
            enabled: false,
            network: NETWORK_BASE_MAINNET.to_string(),
            facilitator_url: DEFAULT_FACILITATOR_URL.to_string(),
            pay_to: String::new(),
            asset: USDC_ADDRESS_BASE.to_string(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
        }
    }
}

impl X402Config {
    /// Create a Base mainnet configuration.
    pub fn mainnet(pay_to: &str) -> Self {
        Self {
            enabled: true,
            network: NETWORK_BASE_MAINNET.to_string(),
            facilitator_url: DEFAULT_FACILITATOR_URL.to_string(),
            pay_to: pay_to.to_string(),
            asset: USDC_ADDRESS_BASE.to_string(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
        }
    }

    /// Create a Base Sepolia configuration.
    pub fn sepolia(pay_to: &str) -> Self {
        Self {
            enabled: true,
            network: NETWORK_BASE_SEPOLIA.to_string(),
            facilitator_url: DEFAULT_FACILITATOR_URL.to_string(),
            pay_to: pay_to.to_string(),
            asset: USDC_ADDRESS_BASE_SEPOLIA.to_string(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
        }
    }
}

// =============================================================================
// Builder Helpers
// =============================================================================

impl PaymentRequired {
    /// Create payment requirements for one inference request.
    ///
    /// Usable even when the gate is disabled: a gateway without a
    /// facilitator still advertises how it could be paid.
    pub fn for_inference(
        resource_url: &str,
        description: &str,
        price_usd: f64,
        config: &X402Config,
    ) -> Self {
        Self {
            x402_version: X402_VERSION,
            accepts: vec![PaymentRequirement {
                scheme: SCHEME_EXACT.to_string(),
                network: config.network.clone(),
                max_amount_required: usd_to_atomic(price_usd).to_string(),
                resource: resource_url.to_string(),
                description: description.to_string(),
                mime_type: "application/json".to_string(),
                pay_to: config.pay_to.clone(),
                max_timeout_seconds: config.max_timeout_seconds,
                asset: config.asset.clone(),
            }],
        }
    }

    /// Encode for the PAYMENT-REQUIRED header.
    pub fn to_header(&self) -> Result<String, String> {
        encode_header(self)
    }

    /// Decode from a PAYMENT-REQUIRED header value.
    pub fn from_header(header_value: &str) -> Result<Self, String> {
        decode_header(header_value)
    }
}

impl PaymentPayload {
    /// Decode a payment payload from a base64-encoded header value.
    pub fn from_header(header_value: &str) -> Result<Self, String> {
        decode_header(header_value)
    }

    /// Encode this payment payload to a base64 string for the header.
    pub fn to_header(&self) -> Result<String, String> {
        encode_header(self)
    }
}

impl PaymentResponse {
    /// Encode for the PAYMENT-RESPONSE header.
    pub fn to_header(&self) -> Result<String, String> {
        encode_header(self)
    }

    /// Decode from a PAYMENT-RESPONSE header value.
    pub fn from_header(header_value: &str) -> Result<Self, String> {
        decode_header(header_value)
    }
}

fn encode_header<T: Serialize>(value: &T) -> Result<String, String> {
    use base64::Engine as _;
    let json = serde_json::to_vec(value).map_err(|e| format!("JSON encode error: {}", e))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&json))
}

fn decode_header<T: serde::de::DeserializeOwned>(header_value: &str) -> Result<T, String> {
    use base64::Engine as _;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(header_value)
        .map_err(|e| format!("base64 decode error: {}", e))?;
    serde_json::from_slice(&decoded).map_err(|e| format!("JSON parse error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAY_TO: &str = "0x1234567890abcdef1234567890abcdef12345678";

    #[test]
    fn test_usd_to_atomic() {
        assert_eq!(usd_to_atomic(0.008), 8_000);
        assert_eq!(usd_to_atomic(1.0), 1_000_000);
        assert_eq!(usd_to_atomic(0.0), 0);
        // rounds instead of truncating
        assert_eq!(usd_to_atomic(0.0000015), 2);
    }

    #[test]
    fn test_payment_required_creation() {
        let config = X402Config::mainnet(PAY_TO);
        let pr = PaymentRequired::for_inference(
            "https://gateway.windfall.energy/v1/chat/completions",
            "LLM inference (gpt-4o)",
            0.008,
            &config,
        );

        assert_eq!(pr.x402_version, X402_VERSION);
        assert_eq!(pr.accepts.len(), 1);
        assert_eq!(pr.accepts[0].scheme, SCHEME_EXACT);
        assert_eq!(pr.accepts[0].network, NETWORK_BASE_MAINNET);
        assert_eq!(pr.accepts[0].max_amount_required, "8000");
        assert_eq!(pr.accepts[0].pay_to, PAY_TO);
        assert_eq!(pr.accepts[0].asset, USDC_ADDRESS_BASE);
    }

    #[test]
    fn test_payment_required_works_when_disabled() {
        let config = X402Config {
            pay_to: PAY_TO.to_string(),
            ..X402Config::default()
        };
        assert!(!config.enabled);

        let pr = PaymentRequired::for_inference("url", "desc", 0.006, &config);
        assert_eq!(pr.accepts[0].max_amount_required, "6000");
    }

    #[test]
    fn test_payment_required_header_roundtrip() {
        let config = X402Config::mainnet(PAY_TO);
        let pr = PaymentRequired::for_inference("url", "desc", 0.008, &config);

        let header = pr.to_header().unwrap();
        let decoded = PaymentRequired::from_header(&header).unwrap();
        assert_eq!(decoded.accepts[0].max_amount_required, "8000");
    }

    #[test]
    fn test_requirement_serializes_camel_case() {
        let config = X402Config::mainnet(PAY_TO);
        let pr = PaymentRequired::for_inference("url", "desc", 0.008, &config);
        let json = serde_json::to_string(&pr).unwrap();

        assert!(json.contains("\"x402Version\":2"));
        assert!(json.contains("\"maxAmountRequired\":\"8000\""));
        assert!(json.contains("\"payTo\""));
        assert!(json.contains("\"maxTimeoutSeconds\":300"));
    }

    #[test]
    fn test_config_defaults() {
        let config = X402Config::default();
        assert!(!config.enabled);
        assert_eq!(config.network, NETWORK_BASE_MAINNET);
        assert_eq!(config.facilitator_url, DEFAULT_FACILITATOR_URL);
        assert_eq!(config.asset, USDC_ADDRESS_BASE);
    }

    #[test]
    fn test_config_sepolia() {
        let config = X402Config::sepolia(PAY_TO);
        assert!(config.enabled);
        assert_eq!(config.network, NETWORK_BASE_SEPOLIA);
        assert_eq!(config.asset, USDC_ADDRESS_BASE_SEPOLIA);
    }

    #[test]
    fn test_payment_payload_header_roundtrip() {
        let payload = PaymentPayload {
            x402_version: X402_VERSION,
            scheme: SCHEME_EXACT.to_string(),
            network: NETWORK_BASE_MAINNET.to_string(),
            payload: ExactEvmPayload {
                signature: "0xcafebabe".to_string(),
                authorization: Eip3009Authorization {
                    from: "0x9999999999999999999999999999999999999999".to_string(),
                    to: PAY_TO.to_string(),
                    value: "8000".to_string(),
                    valid_after: "1700000000".to_string(),
                    valid_before: "1700000300".to_string(),
                    nonce: "0x0123456789abcdef".to_string(),
                },
            },
        };

        let encoded = payload.to_header().unwrap();
        let decoded = PaymentPayload::from_header(&encoded).unwrap();

        assert_eq!(decoded.x402_version, payload.x402_version);
        assert_eq!(decoded.payload.authorization.to, PAY_TO);
        assert_eq!(decoded.payload.authorization.value, "8000");
    }

    #[test]
    fn test_payload_rejects_garbage_header() {
        assert!(PaymentPayload::from_header("not base64!!!").is_err());
        // valid base64, invalid JSON
        assert!(PaymentPayload::from_header("aGVsbG8=").is_err());
    }

    #[test]
    fn test_payment_response_header() {
        let response = PaymentResponse {
            success: true,
            transaction: Some("0xabc".to_string()),
            network: Some(NETWORK_BASE_MAINNET.to_string()),
            payer: Some("0x9999999999999999999999999999999999999999".to_string()),
        };
        let header = response.to_header().unwrap();
        assert!(!header.is_empty());
    }
}
