//! Batch embedding fetcher.
//!
//! Resolves many items at once while keeping remote traffic bounded:
//! cache hits never reach the provider, misses are grouped into batches that
//! stay under a token ceiling, at most `concurrency` batches run per window,
//! and a failed batch degrades to one request per item.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::config::FetchConfig;
use crate::provider::{EmbeddingRequest, restore_order};
use crate::store::{Embeddable, TieredEmbeddingStore};

/// Rough token estimate used to keep requests under the provider's limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    /// Largest estimate a single request may carry.
    pub ceiling: usize,

    /// Characters counted as one token.
    pub chars_per_token: usize,
}

impl TokenBudget {
    /// Estimated token cost of a set of texts.
    pub fn estimate<T: AsRef<str>>(&self, texts: &[T]) -> usize {
        let chars: usize = texts.iter().map(|t| t.as_ref().chars().count()).sum();
        chars / self.chars_per_token.max(1)
    }

    /// Whether a set of texts fits in one request.
    pub fn fits<T: AsRef<str>>(&self, texts: &[T]) -> bool {
        self.estimate(texts) <= self.ceiling
    }
}

impl Default for TokenBudget {
    fn default() -> Self {
        let config = FetchConfig::default();
        Self {
            ceiling: config.token_ceiling,
            chars_per_token: config.chars_per_token,
        }
    }
}

/// Halve `batch` until every piece fits the budget.
///
/// Item order is preserved across the returned sub-batches. A single item
/// that alone exceeds the budget is returned as its own sub-batch, since it
/// cannot be split further.
pub fn split_until_under_budget<T: AsRef<str>>(batch: Vec<T>, budget: &TokenBudget) -> Vec<Vec<T>> {
    if batch.is_empty() {
        return Vec::new();
    }
    if batch.len() == 1 || budget.fits(&batch) {
        return vec![batch];
    }

    let mut left = batch;
    let right = left.split_off(left.len() / 2);

    let mut pieces = split_until_under_budget(left, budget);
    pieces.extend(split_until_under_budget(right, budget));
    pieces
}

/// An item waiting for remote generation.
struct Pending {
    id: String,
    text: String,

    /// Invalidation counter seen when the item missed every cache tier.
    generation: u64,
}

impl AsRef<str> for Pending {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Resolves embeddings for many items through a [`TieredEmbeddingStore`].
pub struct BatchFetcher {
    store: Arc<TieredEmbeddingStore>,
    config: FetchConfig,
}

impl BatchFetcher {
    /// Create a fetcher over `store`.
    pub fn new(store: Arc<TieredEmbeddingStore>, config: FetchConfig) -> Self {
        Self { store, config }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<TieredEmbeddingStore> {
        &self.store
    }

    /// The fetch configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn budget(&self) -> TokenBudget {
        TokenBudget {
            ceiling: self.config.token_ceiling,
            chars_per_token: self.config.chars_per_token,
        }
    }

    /// Resolve an embedding for every item.
    ///
    /// Items whose generation fails even after the per-item fallback are
    /// absent from the result; callers must treat absence as "unknown", not
    /// as a zero vector.
    pub async fn resolve_many<T>(&self, items: &[T]) -> HashMap<String, Embedding>
    where
        T: Embeddable + Sync,
    {
        let mut resolved = HashMap::with_capacity(items.len());
        let mut pending = Vec::new();
        let mut seen = HashSet::new();

        for item in items {
            let id = item.embedding_id();
            if !seen.insert(id.to_string()) {
                continue;
            }
            match self.store.lookup(item).await {
                Some(embedding) => {
                    resolved.insert(id.to_string(), embedding);
                }
                None => pending.push(Pending {
                    id: id.to_string(),
                    text: item.embedding_text(),
                    generation: self.store.generation(id).await,
                }),
            }
        }

        if pending.is_empty() {
            debug!(cached = resolved.len(), "All embeddings resolved from cache tiers");
            return resolved;
        }

        let batches = chunk(pending, self.config.effective_batch_size());
        let windows = chunk(batches, self.config.effective_concurrency());
        let cached = resolved.len();

        info!(
            cached,
            batches = windows.iter().map(Vec::len).sum::<usize>(),
            windows = windows.len(),
            "Generating missing embeddings"
        );

        for (window_index, window) in windows.into_iter().enumerate() {
            debug!(window = window_index, batches = window.len(), "Starting batch window");
            let results = join_all(window.into_iter().map(|batch| self.run_batch(batch))).await;
            for (id, embedding) in results.into_iter().flatten() {
                resolved.insert(id, embedding);
            }
        }

        info!(
            resolved = resolved.len(),
            requested = seen.len(),
            "Batch embedding fetch complete"
        );

        resolved
    }

    /// Run one configured batch, splitting it first if it is over budget.
    async fn run_batch(&self, batch: Vec<Pending>) -> Vec<(String, Embedding)> {
        let size = batch.len();
        let pieces = split_until_under_budget(batch, &self.budget());
        if pieces.len() > 1 {
            debug!(batch_size = size, pieces = pieces.len(), "Split batch to fit token budget");
        }

        join_all(pieces.into_iter().map(|piece| self.embed_piece(piece)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn embed_piece(&self, piece: Vec<Pending>) -> Vec<(String, Embedding)> {
        let requests = piece
            .iter()
            .map(|p| EmbeddingRequest::new(p.text.clone()))
            .collect();

        let outcome = self
            .store
            .provider()
            .embed_batch(requests)
            .await
            .and_then(|responses| restore_order(responses, piece.len()));

        match outcome {
            Ok(embeddings) => {
                let mut out = Vec::with_capacity(piece.len());
                for (pending, embedding) in piece.into_iter().zip(embeddings) {
                    self.store
                        .record_generation(&pending.id, embedding.clone(), pending.generation)
                        .await;
                    out.push((pending.id, embedding));
                }
                out
            }
            Err(e) => {
                warn!(
                    batch_size = piece.len(),
                    "Batch embedding failed, falling back to single requests: {e}"
                );
                self.fallback(piece).await
            }
        }
    }

    async fn fallback(&self, piece: Vec<Pending>) -> Vec<(String, Embedding)> {
        let mut out = Vec::with_capacity(piece.len());
        for pending in piece {
            let generated = self
                .store
                .generate_text_at(&pending.id, &pending.text, pending.generation)
                .await;
            match generated {
                Ok(embedding) => out.push((pending.id, embedding)),
                Err(e) => warn!(ticket_id = %pending.id, "Embedding generation failed: {e}"),
            }
        }
        out
    }
}

fn chunk<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(size).collect());
    }
    chunks
}
