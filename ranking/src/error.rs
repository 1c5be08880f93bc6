//! Error types for the ticket ranker.

use thiserror::Error;

/// Result type alias for ranking operations.
pub type Result<T> = std::result::Result<T, RankingError>;

/// Errors that can occur while setting up the ranker.
///
/// Ranking itself never fails; these only surface from construction.
#[derive(Error, Debug)]
pub enum RankingError {
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] triage_embeddings::EmbeddingError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
