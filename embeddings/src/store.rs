//! Tiered embedding store.
//!
//! Resolution walks the tiers in order and stops at the first hit:
//!
//! 1. the in-process [`EmbeddingCache`]
//! 2. the embedding the item already carries
//! 3. the [`DurableStore`]
//! 4. generation through the [`EmbeddingProvider`]
//!
//! Generated embeddings are written to memory before the call returns and to
//! the durable tier in the background.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::cache::EmbeddingCache;
use crate::durable::DurableStore;
use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingRequest};

/// Something that owns exactly one embedding.
pub trait Embeddable {
    /// Stable id the embedding is keyed by.
    fn embedding_id(&self) -> &str;

    /// The embedding the item already carries, if any.
    fn stored_embedding(&self) -> Option<&Embedding>;

    /// Text sent to the provider when the embedding has to be generated.
    fn embedding_text(&self) -> String;
}

/// Get-or-generate over the memory, item, durable and provider tiers.
pub struct TieredEmbeddingStore {
    provider: Arc<dyn EmbeddingProvider>,
    memory: EmbeddingCache,
    durable: Arc<dyn DurableStore>,

    /// Ids invalidated since their last generation. Their carried and
    /// durable copies are not trusted.
    stale: RwLock<HashSet<String>>,

    /// Per-id counter bumped by every invalidation. A generation that started
    /// under an older value is not recorded.
    generations: Arc<RwLock<HashMap<String, u64>>>,

    /// Outstanding background durable writes.
    writes: TaskTracker,
}

impl TieredEmbeddingStore {
    /// Create a store with a fresh memory tier.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, durable: Arc<dyn DurableStore>) -> Self {
        Self {
            provider,
            memory: EmbeddingCache::new(),
            durable,
            stale: RwLock::new(HashSet::new()),
            generations: Arc::new(RwLock::new(HashMap::new())),
            writes: TaskTracker::new(),
        }
    }

    /// Use an existing memory tier instead of a fresh one.
    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.memory = cache;
        self
    }

    /// The memory tier.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.memory
    }

    /// The remote provider.
    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Resolve from the first three tiers only. Never calls the provider.
    pub async fn lookup<T: Embeddable + ?Sized>(&self, item: &T) -> Option<Embedding> {
        let id = item.embedding_id();

        if let Some(embedding) = self.memory.get(id).await {
            debug!(ticket_id = %id, "Embedding served from memory");
            return Some(embedding);
        }

        if self.stale.read().await.contains(id) {
            return None;
        }

        if let Some(embedding) = item.stored_embedding() {
            self.memory.insert(id, embedding.clone()).await;
            return Some(embedding.clone());
        }

        match self.durable.get(id).await {
            Ok(Some(embedding)) => {
                debug!(ticket_id = %id, "Embedding served from durable tier");
                self.memory.insert(id, embedding.clone()).await;
                Some(embedding)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(ticket_id = %id, "Durable lookup failed: {e}");
                None
            }
        }
    }

    /// Resolve an embedding, generating it if no tier has one.
    pub async fn resolve<T: Embeddable + ?Sized>(&self, item: &T) -> Result<Embedding> {
        if let Some(embedding) = self.lookup(item).await {
            return Ok(embedding);
        }
        self.generate(item).await
    }

    /// Generate a fresh embedding for `item`, skipping every cache tier.
    pub async fn generate<T: Embeddable + ?Sized>(&self, item: &T) -> Result<Embedding> {
        self.generate_text(item.embedding_id(), &item.embedding_text())
            .await
    }

    pub(crate) async fn generate_text(&self, id: &str, text: &str) -> Result<Embedding> {
        let generation = self.generation(id).await;
        self.generate_text_at(id, text, generation).await
    }

    pub(crate) async fn generate_text_at(
        &self,
        id: &str,
        text: &str,
        generation: u64,
    ) -> Result<Embedding> {
        let response = self.provider.embed(EmbeddingRequest::new(text)).await?;
        self.record_generation(id, response.embedding.clone(), generation)
            .await;
        Ok(response.embedding)
    }

    /// Current invalidation counter for `id`.
    pub(crate) async fn generation(&self, id: &str) -> u64 {
        current_generation(&*self.generations.read().await, id)
    }

    /// Record a newly generated embedding: memory now, durable in the background.
    pub async fn record(&self, id: &str, embedding: Embedding) {
        let generation = self.generation(id).await;
        self.record_generation(id, embedding, generation).await;
    }

    /// Record `embedding` unless `id` was invalidated after `generation` was
    /// read. Returns whether it was recorded.
    pub(crate) async fn record_generation(
        &self,
        id: &str,
        embedding: Embedding,
        generation: u64,
    ) -> bool {
        let generations = self.generations.read().await;
        if current_generation(&generations, id) != generation {
            debug!(ticket_id = %id, "Dropping embedding generated for outdated content");
            return false;
        }

        self.memory.insert(id, embedding.clone()).await;
        self.stale.write().await.remove(id);
        self.spawn_persist(id.to_string(), embedding, generation);
        true
    }

    /// Spawn the durable write for `id`. Failures are logged by the task
    /// itself; callers may drop the handle.
    pub async fn persist_in_background(&self, id: String, embedding: Embedding) -> JoinHandle<()> {
        let generation = self.generation(&id).await;
        self.spawn_persist(id, embedding, generation)
    }

    fn spawn_persist(&self, id: String, embedding: Embedding, generation: u64) -> JoinHandle<()> {
        let durable = Arc::clone(&self.durable);
        let generations = Arc::clone(&self.generations);
        self.writes.spawn(async move {
            // Held across the put so an invalidation cannot slip in between.
            let generations = generations.read().await;
            if current_generation(&generations, &id) != generation {
                debug!(ticket_id = %id, "Skipping durable write for outdated content");
                return;
            }
            match durable.put(&id, &embedding).await {
                Ok(()) => debug!(ticket_id = %id, "Persisted embedding"),
                Err(e) => warn!(ticket_id = %id, "Failed to persist embedding: {e}"),
            }
        })
    }

    /// Drop every tier's copy of `id` so the next resolution regenerates.
    pub async fn invalidate(&self, id: &str) {
        *self
            .generations
            .write()
            .await
            .entry(id.to_string())
            .or_default() += 1;
        self.memory.remove(id).await;
        self.stale.write().await.insert(id.to_string());

        if let Err(e) = self.durable.remove(id).await {
            warn!(ticket_id = %id, "Failed to clear durable embedding: {e}");
        }

        debug!(ticket_id = %id, "Invalidated embedding");
    }

    /// Reset the session: empty the memory tier and forget invalidations.
    pub async fn clear(&self) {
        self.memory.clear().await;
        self.stale.write().await.clear();
        info!("Cleared tiered embedding store");
    }

    /// Wait for every background durable write spawned so far, then sync the
    /// durable tier.
    pub async fn flush(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();

        if let Err(e) = self.durable.sync().await {
            warn!("Failed to sync durable embeddings: {e}");
        }
    }
}

fn current_generation(generations: &HashMap<String, u64>, id: &str) -> u64 {
    generations.get(id).copied().unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    use super::*;
    use crate::error::EmbeddingError;
    use crate::mock::MockProvider;
    use crate::provider::EmbeddingResponse;

    pub(crate) struct Item {
        pub id: String,
        pub text: String,
        pub embedding: Option<Embedding>,
    }

    impl Item {
        pub fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                text: format!("{id}\nsummary of {id}"),
                embedding: None,
            }
        }
    }

    impl Embeddable for Item {
        fn embedding_id(&self) -> &str {
            &self.id
        }

        fn stored_embedding(&self) -> Option<&Embedding> {
            self.embedding.as_ref()
        }

        fn embedding_text(&self) -> String {
            self.text.clone()
        }
    }

    /// Durable tier with switchable failures.
    #[derive(Default)]
    pub(crate) struct TestDurable {
        pub entries: Mutex<HashMap<String, Embedding>>,
        pub fail_puts: AtomicBool,
        pub fail_removes: AtomicBool,
        pub put_failures: AtomicUsize,
        pub syncs: AtomicUsize,
    }

    impl TestDurable {
        pub fn entry(&self, id: &str) -> Option<Embedding> {
            self.entries.lock().unwrap().get(id).cloned()
        }
    }

    #[async_trait]
    impl DurableStore for TestDurable {
        async fn get(&self, id: &str) -> Result<Option<Embedding>> {
            Ok(self.entry(id))
        }

        async fn put(&self, id: &str, embedding: &Embedding) -> Result<()> {
            if self.fail_puts.load(Ordering::SeqCst) {
                self.put_failures.fetch_add(1, Ordering::SeqCst);
                return Err(EmbeddingError::Storage("disk full".to_string()));
            }
            self.entries
                .lock()
                .unwrap()
                .insert(id.to_string(), embedding.clone());
            Ok(())
        }

        async fn remove(&self, id: &str) -> Result<()> {
            if self.fail_removes.load(Ordering::SeqCst) {
                return Err(EmbeddingError::Storage("read-only".to_string()));
            }
            self.entries.lock().unwrap().remove(id);
            Ok(())
        }

        async fn sync(&self) -> Result<()> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Provider whose `embed` parks until released, to interleave other calls.
    struct GatedProvider {
        started: Notify,
        release: Notify,
        embedding: Embedding,
    }

    #[async_trait]
    impl EmbeddingProvider for GatedProvider {
        fn name(&self) -> &str {
            "gated"
        }

        fn default_model(&self) -> &str {
            "gated"
        }

        fn default_dimension(&self) -> usize {
            self.embedding.len()
        }

        async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(EmbeddingResponse {
                embedding: self.embedding.clone(),
                model: "gated".to_string(),
                dimension: self.embedding.len(),
                index: None,
                tokens_used: None,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn store(provider: &Arc<MockProvider>, durable: &Arc<TestDurable>) -> TieredEmbeddingStore {
        TieredEmbeddingStore::new(provider.clone(), durable.clone())
    }

    #[tokio::test]
    async fn test_second_resolve_is_served_from_memory() {
        let provider = Arc::new(MockProvider::new(4));
        let durable = Arc::new(TestDurable::default());
        let store = store(&provider, &durable);
        let item = Item::new("TCK-1");

        let first = store.resolve(&item).await.unwrap();
        let second = store.resolve(&item).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.embed_calls(), 1);
    }

    #[tokio::test]
    async fn test_carried_embedding_is_adopted() {
        let provider = Arc::new(MockProvider::new(2));
        let durable = Arc::new(TestDurable::default());
        let store = store(&provider, &durable);
        let mut item = Item::new("TCK-1");
        item.embedding = Some(vec![0.5, 0.5]);

        assert_eq!(store.resolve(&item).await.unwrap(), vec![0.5, 0.5]);
        assert!(store.cache().contains("TCK-1").await);
        assert_eq!(provider.embed_calls(), 0);
    }

    #[tokio::test]
    async fn test_durable_hit_populates_memory() {
        let provider = Arc::new(MockProvider::new(2));
        let durable = Arc::new(TestDurable::default());
        durable.put("TCK-1", &vec![1.0, 0.0]).await.unwrap();
        let store = store(&provider, &durable);

        assert_eq!(
            store.resolve(&Item::new("TCK-1")).await.unwrap(),
            vec![1.0, 0.0]
        );
        assert_eq!(store.cache().get("TCK-1").await, Some(vec![1.0, 0.0]));
        assert_eq!(provider.embed_calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_writes_through_to_durable() {
        let provider = Arc::new(MockProvider::new(2).with_vector("TCK-1", vec![0.0, 1.0]));
        let durable = Arc::new(TestDurable::default());
        let store = store(&provider, &durable);

        store.resolve(&Item::new("TCK-1")).await.unwrap();
        store.flush().await;

        assert_eq!(durable.entry("TCK-1"), Some(vec![0.0, 1.0]));
    }

    #[tokio::test]
    async fn test_invalidation_forces_regeneration() {
        let provider = Arc::new(MockProvider::new(2).with_vector("TCK-1", vec![0.0, 1.0]));
        let durable = Arc::new(TestDurable::default());
        durable.put("TCK-1", &vec![1.0, 0.0]).await.unwrap();
        let store = store(&provider, &durable);
        let item = Item::new("TCK-1");

        assert_eq!(store.resolve(&item).await.unwrap(), vec![1.0, 0.0]);
        store.invalidate("TCK-1").await;
        assert_eq!(durable.entry("TCK-1"), None);

        assert_eq!(store.resolve(&item).await.unwrap(), vec![0.0, 1.0]);
        assert_eq!(provider.embed_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidation_holds_when_durable_removal_fails() {
        let provider = Arc::new(MockProvider::new(2).with_vector("TCK-1", vec![0.0, 1.0]));
        let durable = Arc::new(TestDurable::default());
        durable.put("TCK-1", &vec![1.0, 0.0]).await.unwrap();
        durable.fail_removes.store(true, Ordering::SeqCst);
        let store = store(&provider, &durable);
        let mut item = Item::new("TCK-1");
        item.embedding = Some(vec![1.0, 0.0]);

        store.resolve(&item).await.unwrap();
        store.invalidate("TCK-1").await;

        // Both the carried copy and the durable record are stale now.
        assert_eq!(store.resolve(&item).await.unwrap(), vec![0.0, 1.0]);
        assert_eq!(provider.embed_calls(), 1);

        // Once regenerated the id is trusted again.
        store.cache().clear().await;
        store.flush().await;
        assert_eq!(store.lookup(&item).await, Some(vec![1.0, 0.0]));
    }

    #[tokio::test]
    async fn test_invalidation_during_generation_discards_result() {
        let provider = Arc::new(GatedProvider {
            started: Notify::new(),
            release: Notify::new(),
            embedding: vec![1.0, 0.0],
        });
        let durable = Arc::new(TestDurable::default());
        let store = Arc::new(TieredEmbeddingStore::new(provider.clone(), durable.clone()));

        let pending = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.resolve(&Item::new("TCK-1")).await }
        });
        provider.started.notified().await;
        store.invalidate("TCK-1").await;
        provider.release.notify_one();

        // The caller still gets its vector, but no tier keeps it.
        assert_eq!(pending.await.unwrap().unwrap(), vec![1.0, 0.0]);
        store.flush().await;
        assert!(!store.cache().contains("TCK-1").await);
        assert_eq!(durable.entry("TCK-1"), None);
    }

    #[tokio::test]
    async fn test_outdated_generation_is_not_recorded() {
        let provider = Arc::new(MockProvider::new(2).with_vector("TCK-1", vec![0.0, 1.0]));
        let durable = Arc::new(TestDurable::default());
        let store = store(&provider, &durable);

        let generation = store.generation("TCK-1").await;
        store.invalidate("TCK-1").await;
        assert!(
            !store
                .record_generation("TCK-1", vec![9.0, 9.0], generation)
                .await
        );

        assert_eq!(store.resolve(&Item::new("TCK-1")).await.unwrap(), vec![0.0, 1.0]);
        store.flush().await;
        assert_eq!(durable.entry("TCK-1"), Some(vec![0.0, 1.0]));
    }

    #[tokio::test]
    async fn test_flush_syncs_durable_tier() {
        let provider = Arc::new(MockProvider::new(2));
        let durable = Arc::new(TestDurable::default());
        let store = store(&provider, &durable);

        store.resolve(&Item::new("TCK-1")).await.unwrap();
        store.flush().await;

        assert_eq!(durable.syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_durable_write_failure_is_not_fatal() {
        let provider = Arc::new(MockProvider::new(3));
        let durable = Arc::new(TestDurable::default());
        durable.fail_puts.store(true, Ordering::SeqCst);
        let store = store(&provider, &durable);

        let embedding = store.resolve(&Item::new("TCK-9")).await.unwrap();
        store.flush().await;

        assert_eq!(durable.put_failures.load(Ordering::SeqCst), 1);
        assert_eq!(store.cache().get("TCK-9").await, Some(embedding));
    }

    #[tokio::test]
    async fn test_background_write_failure_is_contained_in_task() {
        let provider = Arc::new(MockProvider::new(2));
        let durable = Arc::new(TestDurable::default());
        durable.fail_puts.store(true, Ordering::SeqCst);
        let store = store(&provider, &durable);

        let handle = store
            .persist_in_background("TCK-2".to_string(), vec![1.0, 1.0])
            .await;

        // The task swallows the storage error instead of panicking.
        assert!(handle.await.is_ok());
        assert_eq!(durable.put_failures.load(Ordering::SeqCst), 1);
        assert_eq!(durable.entry("TCK-2"), None);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates_from_resolve() {
        let provider = Arc::new(MockProvider::new(2).with_failing_text("TCK-1"));
        let durable = Arc::new(TestDurable::default());
        let store = store(&provider, &durable);

        assert!(store.resolve(&Item::new("TCK-1")).await.is_err());
        assert!(!store.cache().contains("TCK-1").await);
    }

    #[tokio::test]
    async fn test_clear_resets_session() {
        let provider = Arc::new(MockProvider::new(2));
        let durable = Arc::new(TestDurable::default());
        let store = store(&provider, &durable);
        let item = Item::new("TCK-1");

        store.resolve(&item).await.unwrap();
        store.flush().await;
        store.clear().await;
        assert!(store.cache().is_empty().await);

        // Durable copy survives a session reset.
        store.resolve(&item).await.unwrap();
        assert_eq!(provider.embed_calls(), 1);
    }
}
