//! Shared domain types for the Windfall inference gateway.
//!
//! This crate defines the data structures passed between the gateway
//! subsystems. It contains no I/O and no business logic beyond small
//! constructors and accessors; the heavier crates (oracle, router,
//! cache, payments, pipeline) build on these types.
//!
//! # Module Organization
//!
//! - [`chat`]: chat completion requests and the typed request headers
//! - [`energy`]: per-zone energy readings and the fleet cost surface
//! - [`engagement`]: engagement levels derived from request signals
//! - [`error`]: stable gateway error codes
//! - [`identity`]: caller identity, identity tiers, and agent sessions
//! - [`node`]: static node descriptors and probe health snapshots
//! - [`payment`]: the resolved payment method and verified transfers
//! - [`routing`]: routing modes and routing decisions
//!
//! # Type Conventions
//!
//! - Monetary amounts are USD `f64`, displayed rounded to 4 decimals
//! - Energy prices are USD per kWh, carbon intensity is gCO2 per kWh
//! - Timestamps are Unix milliseconds (`u64`) unless a stored format
//!   requires ISO-8601 strings
//! - Wire-facing structs serialize as camelCase

pub mod chat;
pub mod energy;
pub mod engagement;
pub mod error;
pub mod identity;
pub mod node;
pub mod payment;
pub mod routing;

// Re-export commonly used types at the crate root
pub use chat::{completion_model, completion_usage, ChatMessage, ChatRequest, RequestHeaders, TokenUsage};
pub use energy::{CostSurface, EnergyReading, EnergySource};
pub use engagement::EngagementLevel;
pub use error::ErrorCode;
pub use identity::{
    normalize_wallet, AgentSession, CallerIdentity, IdentityTier, SessionKind, API_KEY_PREFIX,
};
pub use node::{NodeHealth, NodeInfo};
pub use payment::{FreeTierAccount, PaymentResolution, TransferKind, VerifiedTransfer};
pub use routing::{RoutingDecision, RoutingMode};

/// Identifier of a compute node in the fleet (e.g. `"windfall-fi-01"`).
pub type NodeId = String;

/// Crate version, exposed for diagnostics endpoints.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
