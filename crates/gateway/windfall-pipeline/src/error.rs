//! Pipeline error type.
//!
//! Payment denials are not errors; they flow through the pipeline as
//! ordinary 402 responses. What lands here is infrastructure: storage,
//! payment plumbing, or the upstream provider failing mid-request. The
//! public entry point converts these to a 500 (or 400 for validation)
//! so the transport layer never sees a `Result`.

use thiserror::Error;
use windfall_pay::PayError;
use windfall_store::StoreError;
use windfall_types::ErrorCode;

use crate::provider::ProviderError;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request body carried no messages.
    #[error("messages array is required")]
    EmptyMessages,

    /// A database read or write failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Payment plumbing failed below the denial level.
    #[error(transparent)]
    Pay(#[from] PayError),

    /// The inference provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A component could not be constructed at startup.
    #[error("gateway setup failed: {0}")]
    Setup(String),
}

impl PipelineError {
    /// Stable code for logs and error responses.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            PipelineError::EmptyMessages => ErrorCode::EmptyMessages,
            PipelineError::Store(_) => ErrorCode::StorageFailed,
            PipelineError::Pay(PayError::Store(_)) => ErrorCode::StorageFailed,
            PipelineError::Pay(PayError::Rejected { .. }) => ErrorCode::PaymentRequired,
            PipelineError::Provider(_) => ErrorCode::ProviderFailed,
            PipelineError::Setup(_) => ErrorCode::Internal,
        }
    }

    /// HTTP status the transport layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            PipelineError::EmptyMessages => 400,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_400() {
        let err = PipelineError::EmptyMessages;
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.error_code(), ErrorCode::EmptyMessages);
        assert_eq!(err.to_string(), "messages array is required");
    }

    #[test]
    fn test_infrastructure_maps_to_500() {
        let err = PipelineError::from(StoreError::invalid_data("corrupt row"));
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.error_code(), ErrorCode::StorageFailed);

        let err = PipelineError::from(ProviderError::Upstream {
            status: 502,
            detail: "bad gateway".to_string(),
        });
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.error_code(), ErrorCode::ProviderFailed);
    }

    #[test]
    fn test_pay_store_failures_count_as_storage() {
        let err = PipelineError::from(PayError::Store(StoreError::invalid_data("bad")));
        assert_eq!(err.error_code(), ErrorCode::StorageFailed);
    }
}
