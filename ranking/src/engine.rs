//! Ticket ranking engine.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use triage_embeddings::{
    BatchFetcher, CacheStats, DurableStore, EmbeddingProvider, JsonFileStore, NoopDurableStore,
    OpenAIProvider, ProbeResult, TieredEmbeddingStore, probe_provider,
};

use crate::change::ContentChangeDetector;
use crate::config::{RankingConfig, SimilarityConfig};
use crate::error::{RankingError, Result};
use crate::ranking::{RankedTicket, count_owner_tickets, rank_tickets, related_tier_allowed};
use crate::ticket::Ticket;

/// Ranks tickets for a viewing user.
///
/// This is the main entry point. It coordinates:
/// - Owner matching against assignee and reporter
/// - Embedding resolution through the tiered store and batch fetcher
/// - Related-ticket selection by cosine similarity
/// - Invalidation of embeddings whose ticket content changed
pub struct TicketRanker {
    /// Configuration.
    config: RankingConfig,

    /// Remote embedding provider.
    provider: Arc<dyn EmbeddingProvider>,

    /// Batch fetcher over the tiered store.
    fetcher: BatchFetcher,

    /// Last observed ticket content.
    detector: Mutex<ContentChangeDetector>,
}

impl TicketRanker {
    /// Create a new ranker builder.
    pub fn builder() -> TicketRankerBuilder {
        TicketRankerBuilder::new()
    }

    /// Create a ranker backed by the OpenAI-compatible provider in `config`.
    pub async fn new(config: RankingConfig) -> Result<Self> {
        Self::builder().with_config(config).build().await
    }

    /// Rank `tickets` for `owner`, returning tickets only.
    pub async fn rank(
        &self,
        tickets: Vec<Ticket>,
        owner: Option<&str>,
        similarity_enabled: bool,
    ) -> Vec<Ticket> {
        self.rank_detailed(tickets, owner, similarity_enabled)
            .await
            .into_iter()
            .map(|ranked| ranked.ticket)
            .collect()
    }

    /// Rank `tickets` for `owner`, keeping the tier and match details.
    ///
    /// Never fails. When the provider is unavailable or any embedding cannot
    /// be produced, the affected tickets simply fall through to the
    /// structural tiers.
    pub async fn rank_detailed(
        &self,
        mut tickets: Vec<Ticket>,
        owner: Option<&str>,
        similarity_enabled: bool,
    ) -> Vec<RankedTicket> {
        let similarity = SimilarityConfig {
            enabled: similarity_enabled && self.config.similarity.enabled,
            ..self.config.similarity
        };
        let owner_count = count_owner_tickets(&tickets, owner);

        if !related_tier_allowed(owner_count, &similarity) {
            debug!(
                owner_tickets = owner_count,
                enabled = similarity.enabled,
                "Related tickets not computed"
            );
            return rank_tickets(tickets, owner, None, &similarity);
        }

        if !self.provider.is_available() {
            info!(
                provider = self.provider.name(),
                "Embedding provider unavailable, ranking without similarity"
            );
            return rank_tickets(tickets, owner, None, &similarity);
        }

        let embeddings = self.fetcher.resolve_many(&tickets).await;
        for ticket in &mut tickets {
            if ticket.embedding.is_none() {
                ticket.embedding = embeddings.get(&ticket.id).cloned();
            }
        }

        rank_tickets(tickets, owner, Some(&embeddings), &similarity)
    }

    /// Invalidate embeddings for tickets whose summary or description
    /// changed since the last sync. Returns the ids that were invalidated.
    pub async fn sync_tickets(&self, tickets: &mut [Ticket]) -> Vec<String> {
        let changed = self.detector.lock().await.observe(tickets);
        if changed.is_empty() {
            return changed;
        }

        for ticket in tickets.iter_mut() {
            if changed.contains(&ticket.id) {
                ticket.embedding = None;
            }
        }
        for id in &changed {
            self.store().invalidate(id).await;
        }

        info!(count = changed.len(), "Invalidated embeddings for changed tickets");
        changed
    }

    /// Check whether the embedding provider is usable.
    pub async fn probe(&self) -> ProbeResult {
        probe_provider(self.provider.as_ref()).await
    }

    /// Wait for background embedding writes and persist them. Call before
    /// shutdown; unflushed embeddings are regenerated next session.
    pub async fn flush(&self) {
        self.store().flush().await;
    }

    /// Memory-tier statistics.
    pub async fn stats(&self) -> CacheStats {
        self.store().cache().stats().await
    }

    /// The tiered embedding store.
    pub fn store(&self) -> &Arc<TieredEmbeddingStore> {
        self.fetcher.store()
    }

    /// The configuration.
    pub fn config(&self) -> &RankingConfig {
        &self.config
    }
}

/// Builder for [`TicketRanker`].
pub struct TicketRankerBuilder {
    config: RankingConfig,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    durable: Option<Arc<dyn DurableStore>>,
}

impl TicketRankerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RankingConfig::default(),
            provider: None,
            durable: None,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: RankingConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `provider` instead of building one from the configuration.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use `store` as the durable tier instead of the configured path.
    pub fn with_durable_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.durable = Some(store);
        self
    }

    /// Build the ranker.
    pub async fn build(self) -> Result<TicketRanker> {
        let threshold = self.config.similarity.threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(RankingError::Config(format!(
                "similarity threshold must be within [-1, 1], got {threshold}"
            )));
        }

        let provider = match self.provider {
            Some(provider) => provider,
            None => Arc::new(OpenAIProvider::from_config(&self.config.provider)?),
        };

        let durable: Arc<dyn DurableStore> = match (self.durable, &self.config.durable_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(JsonFileStore::open(path).await?),
            (None, None) => Arc::new(NoopDurableStore),
        };

        let store = Arc::new(TieredEmbeddingStore::new(Arc::clone(&provider), durable));
        let fetcher = BatchFetcher::new(store, self.config.fetch);

        info!(provider = provider.name(), "Ticket ranker initialized");

        Ok(TicketRanker {
            config: self.config,
            provider,
            fetcher,
            detector: Mutex::new(ContentChangeDetector::new()),
        })
    }
}

impl Default for TicketRankerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
