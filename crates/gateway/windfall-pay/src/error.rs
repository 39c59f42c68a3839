//! Error types for payment resolution.

use thiserror::Error;
use windfall_store::StoreError;

/// Result type alias for payment operations.
pub type PayResult<T> = std::result::Result<T, PayError>;

/// Errors that can occur while resolving payment for a request.
///
/// A [`PayError::Rejected`] carries client-facing text and turns into a
/// 402 response; everything else is an internal fault.
#[derive(Debug, Error)]
pub enum PayError {
    /// A payment was presented but cannot be accepted.
    #[error("payment rejected: {reason}")]
    Rejected { reason: String },

    /// Storage layer failure mid-resolution.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PayError {
    /// Create a rejection with client-facing text.
    pub fn rejected(reason: impl Into<String>) -> Self {
        PayError::Rejected {
            reason: reason.into(),
        }
    }

    /// The client-facing rejection text, if this is a rejection.
    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            PayError::Rejected { reason } => Some(reason),
            PayError::Store(_) => None,
        }
    }
}

/// Errors from JSON-RPC calls to the Base chain.
///
/// These never surface to clients directly; the verifier folds them
/// into a [`PayError::Rejected`] with the error text as the reason,
/// so a flaky RPC node reads as a failed verification rather than a
/// gateway fault.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Transport-level failure reaching the RPC node.
    #[error("RPC transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Node { code: i64, message: String },

    /// The node answered 200 but the body is not what we asked for.
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// Create an invalid response error.
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        RpcError::InvalidResponse(msg.into())
    }
}
