//! Request pipeline for the Windfall gateway.
//!
//! Everything between "an inference request arrived" and "a response
//! left" lives here. [`GatewayNode`] composes the other gateway
//! crates and runs each request through a fixed sequence:
//!
//! 1. validate the body
//! 2. identify the caller and classify engagement
//! 3. pick the model and price the request
//! 4. answer from the semantic cache when possible
//! 5. resolve payment, or answer 402 with machine-readable terms
//! 6. route across the fleet by energy price or carbon intensity
//! 7. forward to a peer, or run inference locally
//! 8. bill exactly once, cache, log, and attest
//!
//! # Components
//!
//! - **[`pipeline`]**: [`GatewayNode`] and the request flow
//! - **[`pricing`]**: per-model price list and green surcharge
//! - **[`provider`]**: upstream inference seam and the OpenRouter client
//! - **[`proxy`]**: node-to-node request forwarding
//! - **[`attestation`]**: verifiable execution records
//! - **[`status`]**: operator health and status reports
//! - **[`config`]**, **[`request`]**, **[`response`]**, **[`error`]**:
//!   plumbing shared by the stages
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use windfall_oracle::{EnergyOracle, OracleConfig};
//! use windfall_pipeline::{GatewayConfig, GatewayNode, GatewayRequest, OpenRouterProvider};
//! use windfall_store::GatewayState;
//! use windfall_types::{ChatMessage, ChatRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::new("wf-sto", "Stockholm")
//!     .with_coordinates(59.33, 18.07)
//!     .with_wallet_address("0x9fe46736679d2d9a65f0992f2272de9f3c7fa6e0");
//! let state = GatewayState::open_in_memory()?;
//! let oracle = Arc::new(EnergyOracle::new(OracleConfig::new(config.nodes.clone()))?);
//! let provider = Arc::new(OpenRouterProvider::new("sk-or-...")?);
//!
//! let node = GatewayNode::with_default_payments(config, state, oracle, provider)?;
//! let body = ChatRequest::from_messages(vec![ChatMessage::user("hello")]);
//! let response = node.handle(GatewayRequest::new(body)).await;
//! println!("{} {}", response.status, response.body);
//! # Ok(())
//! # }
//! ```

pub mod attestation;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod pricing;
pub mod provider;
pub mod proxy;
pub mod request;
pub mod response;
pub mod status;

pub use attestation::{AttestationData, AttestationError, AttestationSink};
pub use config::{GatewayConfig, DEFAULT_GREEN_SURCHARGE, DEFAULT_MAX_TOKENS_CAP};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::GatewayNode;
pub use pricing::{ModelPricing, DIRECT_COST_PREMIUM, DIRECT_COST_STANDARD};
pub use provider::{
    CompletionCall, InferenceProvider, OpenRouterProvider, ProviderError, ProviderReply,
    DEFAULT_PROVIDER_URL,
};
pub use proxy::{ForwardedReply, HttpPeerForwarder, PeerForwarder, ProxyError};
pub use request::{request_id, GatewayRequest};
pub use response::{
    format_usd, GatewayResponse, PaymentMethodsHint, PaymentRequiredBody, WindfallExtension,
    HEADER_CACHE, HEADER_COST, HEADER_ENGAGEMENT, HEADER_MODE, HEADER_MODEL, HEADER_NODE,
    HEADER_SAVED,
};
pub use status::{
    GatewayHealth, GatewayStatus, NodeSummary, OracleStatus, PricingStatus, RoutingStatus,
};
