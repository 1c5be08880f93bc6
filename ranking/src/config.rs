//! Configuration for the ticket ranker.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use triage_embeddings::{FetchConfig, ProviderConfig};

/// Configuration for [`crate::TicketRanker`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Remote embedding provider.
    pub provider: ProviderConfig,

    /// Batch fetching.
    pub fetch: FetchConfig,

    /// Related-ticket selection.
    pub similarity: SimilarityConfig,

    /// JSON file for the durable embedding tier. `None` disables persistence.
    pub durable_path: Option<PathBuf>,
}

impl RankingConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider configuration.
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    /// Set the fetch configuration.
    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Set the similarity configuration.
    pub fn with_similarity(mut self, similarity: SimilarityConfig) -> Self {
        self.similarity = similarity;
        self
    }

    /// Persist embeddings to `path`.
    pub fn with_durable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.durable_path = Some(path.into());
        self
    }
}

/// Configuration for related-ticket selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Whether related tickets are computed at all.
    pub enabled: bool,

    /// Minimum cosine similarity (inclusive).
    pub threshold: f32,

    /// Largest owner-ticket count (inclusive) for which related tickets are
    /// computed.
    pub max_owner_tickets: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.75,
            max_owner_tickets: 20,
        }
    }
}
