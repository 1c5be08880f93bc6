//! # Embeddings
//!
//! Semantic embeddings for ticket triage, with as few remote calls as
//! possible.
//!
//! ## Features
//!
//! - **Tiered Store**: memory, carried, durable, then generated
//! - **Batch Fetcher**: token-bounded batches, windowed concurrency, per-item fallback
//! - **Similarity**: cosine similarity over fixed-dimension vectors
//! - **Probe**: classify whether the provider is reachable and authorized
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  BatchFetcher ──► TieredEmbeddingStore ──► EmbeddingProvider    │
//! │                        │        │                               │
//! │                        ▼        ▼                               │
//! │               EmbeddingCache  DurableStore                      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod durable;
pub mod error;
pub mod fetcher;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
pub mod probe;
pub mod provider;
pub mod similarity;
pub mod store;

pub use cache::{CacheStats, EmbeddingCache};
pub use config::{FetchConfig, ProviderConfig};
pub use durable::{DurableStore, JsonFileStore, NoopDurableStore};
pub use error::{EmbeddingError, FailureKind, Result};
pub use fetcher::{BatchFetcher, TokenBudget, split_until_under_budget};
pub use probe::{ProbeReason, ProbeResult, probe, probe_provider};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider, restore_order,
};
pub use similarity::{SimilarityResult, cosine_similarity, similar_at_least};
pub use store::{Embeddable, TieredEmbeddingStore};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings (varies by model).
pub const DEFAULT_DIMENSION: usize = 1536; // OpenAI text-embedding-3-small
