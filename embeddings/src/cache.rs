//! In-process embedding cache, keyed by ticket id.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Embedding;

/// Session-scoped cache for embeddings to avoid redundant API calls.
///
/// Cloning is cheap and yields a handle to the same map. There is no
/// eviction: entries live until [`EmbeddingCache::remove`] or
/// [`EmbeddingCache::clear`].
#[derive(Clone, Default)]
pub struct EmbeddingCache {
    entries: Arc<RwLock<HashMap<String, Embedding>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl EmbeddingCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, id: &str) -> Option<Embedding> {
        let found = self.entries.read().await.get(id).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Put an embedding in the cache. Last write wins.
    pub async fn insert(&self, id: impl Into<String>, embedding: Embedding) {
        let id = id.into();
        debug!(ticket_id = %id, "Cached embedding");
        self.entries.write().await.insert(id, embedding);
    }

    /// Check if an embedding is cached.
    pub async fn contains(&self, id: &str) -> bool {
        self.entries.read().await.contains_key(id)
    }

    /// Remove an embedding from the cache.
    pub async fn remove(&self, id: &str) -> Option<Embedding> {
        self.entries.write().await.remove(id)
    }

    /// Number of cached embeddings.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Clear the entire cache and reset the counters.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        info!("Cleared embedding cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().await.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Lookups served from memory.
    pub hits: u64,

    /// Lookups that fell through to a slower tier.
    pub misses: u64,
}
