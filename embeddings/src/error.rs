//! Error types for the embeddings system.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// The provider rejected our credentials.
    #[error("provider rejected credentials: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The provider could not be reached (connect failure or timeout).
    #[error("network error: {0}")]
    Network(String),

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Durable tier error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Coarse classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unconfigured,
    Auth,
    RateLimit,
    Network,
    Other,
}

impl EmbeddingError {
    /// Map a transport error, separating "could not reach the provider"
    /// from everything else reqwest reports.
    pub fn from_transport(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            EmbeddingError::Network(error.to_string())
        } else {
            EmbeddingError::Http(error)
        }
    }

    /// Classify this error for callers that only care about the failure class.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            EmbeddingError::ProviderNotConfigured => FailureKind::Unconfigured,
            EmbeddingError::Unauthorized(_) => FailureKind::Auth,
            EmbeddingError::RateLimited { .. } => FailureKind::RateLimit,
            EmbeddingError::Network(_) => FailureKind::Network,
            EmbeddingError::Http(e) if e.is_connect() || e.is_timeout() => FailureKind::Network,
            _ => FailureKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_classification() {
        assert_eq!(
            EmbeddingError::ProviderNotConfigured.failure_kind(),
            FailureKind::Unconfigured
        );
        assert_eq!(
            EmbeddingError::Unauthorized("bad key".to_string()).failure_kind(),
            FailureKind::Auth
        );
        assert_eq!(
            EmbeddingError::RateLimited {
                retry_after_secs: 5
            }
            .failure_kind(),
            FailureKind::RateLimit
        );
        assert_eq!(
            EmbeddingError::Network("refused".to_string()).failure_kind(),
            FailureKind::Network
        );
        assert_eq!(
            EmbeddingError::ApiRequest("500".to_string()).failure_kind(),
            FailureKind::Other
        );
    }
}
