//! x402 Payment Required protocol integration for the Windfall gateway.
//!
//! This crate implements the [x402 payment protocol](https://www.x402.org/)
//! for pay-per-request inference. x402 enables HTTP-native micropayments
//! where AI agents pay for completions programmatically, without accounts
//! or API keys.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  POST /v1/chat/completions  ┌──────────────┐
//! │  AI Agent    │ ───────────────────────────→│  Windfall    │
//! │  (Client)    │ ←───────────────────────────│  Gateway     │
//! │              │  402 + PAYMENT-REQUIRED hdr │              │
//! │              │                             │              │
//! │              │  POST + PAYMENT-SIGNATURE   │              │
//! │              │ ───────────────────────────→│              │
//! │              │                             │    ┌─────────┤
//! │              │                             │    │Payment  │
//! │              │                             │    │Gate     │
//! │              │                             │    └────┬────┤
//! │              │                             │         │    │
//! │              │                             │   ┌─────▼───┐│
//! │              │                             │   │x402.org ││
//! │              │  200 + completion           │   │(verify  ││
//! │              │ ←───────────────────────────│   │+settle) ││
//! │              │  + PAYMENT-RESPONSE hdr     │   └─────────┘│
//! └─────────────┘                             └──────────────┘
//! ```
//!
//! # Components
//!
//! - **[`types`]**: x402 protocol message types (PaymentRequired, PaymentPayload, etc.)
//! - **[`facilitator`]**: Client for CDP-compatible facilitators
//! - **[`gate`]**: Payment gate guarding the inference endpoint
//! - **[`error`]**: Error types with recovery suggestions
//!
//! # Usage
//!
//! ```rust,no_run
//! use windfall_x402::{PaymentGate, PaymentRequired, X402Config};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = X402Config::mainnet("0x1234567890abcdef1234567890abcdef12345678");
//! let gate = PaymentGate::new(config.clone())?;
//!
//! // When a client requests inference without payment:
//! let required = PaymentRequired::for_inference(
//!     "https://gateway.windfall.energy/v1/chat/completions",
//!     "LLM inference (gpt-4o)",
//!     0.008,
//!     &config,
//! );
//! // → Return 402 with required.to_header()? in the PAYMENT-REQUIRED header
//!
//! // When the client retries with a PAYMENT-SIGNATURE header:
//! let header = "base64-encoded-payment...";
//! let settled = gate
//!     .process_payment(header, "https://gateway.windfall.energy/v1/chat/completions", 0.008)
//!     .await?;
//! // → deliver the completion, echo settled.transaction in PAYMENT-RESPONSE
//! # Ok(())
//! # }
//! ```
//!
//! # Base Payment Scheme
//!
//! Windfall uses the "exact" scheme with USDC on Base:
//! 1. Client signs an EIP-3009 `transferWithAuthorization` for the exact amount
//! 2. Client sends the signed authorization in the PAYMENT-SIGNATURE header
//! 3. The facilitator verifies the signature, then submits it on-chain,
//!    paying gas itself
//! 4. The gateway echoes the settlement transaction back to the client
//!
//! Compatible with the [Coinbase CDP](https://docs.cdp.coinbase.com/x402/)
//! facilitator and any x402 facilitator implementing verify/settle.

pub mod error;
pub mod facilitator;
pub mod gate;
pub mod types;

pub use error::{X402Error, X402Result};
pub use facilitator::{Facilitator, FacilitatorClient};
pub use gate::{PaymentGate, SettledX402, X402Status};
pub use types::{
    usd_to_atomic, PaymentPayload, PaymentRequired, PaymentRequirement, PaymentResponse,
    X402Config, DEFAULT_FACILITATOR_URL, HEADER_PAYMENT_REQUIRED, HEADER_PAYMENT_RESPONSE,
    HEADER_PAYMENT_SIGNATURE, HEADER_X_PAYMENT, NETWORK_BASE_MAINNET, NETWORK_BASE_SEPOLIA,
    SCHEME_EXACT, USDC_ADDRESS_BASE, USDC_ADDRESS_BASE_SEPOLIA, X402_VERSION,
};
