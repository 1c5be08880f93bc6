//! Mock embedding provider for testing.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::Embedding;
use crate::error::{EmbeddingError, FailureKind, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};

/// Deterministic provider that never touches the network.
///
/// Texts are matched by their first line, so a ticket text (which starts with
/// the ticket key) can be addressed by key. Unknown texts get a vector derived
/// from a hash of the text.
pub struct MockProvider {
    dimension: usize,
    vectors: HashMap<String, Embedding>,
    failing: HashSet<String>,
    failure: Option<FailureKind>,
    available: bool,
    reverse_batches: bool,
    fail_batches: AtomicBool,
    embed_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

impl MockProvider {
    /// Create a mock producing vectors of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
            failing: HashSet::new(),
            failure: None,
            available: true,
            reverse_batches: false,
            fail_batches: AtomicBool::new(false),
            embed_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Return `embedding` for texts whose first line is `key`.
    pub fn with_vector(mut self, key: impl Into<String>, embedding: Embedding) -> Self {
        self.vectors.insert(key.into(), embedding);
        self
    }

    /// Fail every call that includes a text whose first line is `key`.
    pub fn with_failing_text(mut self, key: impl Into<String>) -> Self {
        self.failing.insert(key.into());
        self
    }

    /// Fail every call with an error of the given class.
    pub fn with_failure(mut self, kind: FailureKind) -> Self {
        self.failure = Some(kind);
        self
    }

    /// Report the provider as unconfigured.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Return batch results in reverse order, tagged with their input index.
    pub fn with_reversed_batches(mut self) -> Self {
        self.reverse_batches = true;
        self
    }

    /// Make every batch call fail while single-text calls still work.
    pub fn set_fail_batches(&self, fail: bool) {
        self.fail_batches.store(fail, Ordering::SeqCst);
    }

    /// Number of single-text calls made.
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Number of batch calls made.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Sizes of every batch call, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn key_of(text: &str) -> &str {
        text.lines().next().unwrap_or(text)
    }

    fn vector_for(&self, text: &str) -> Result<Embedding> {
        if let Some(kind) = self.failure {
            return Err(error_for(kind));
        }
        let key = Self::key_of(text);
        if self.failing.contains(key) {
            return Err(EmbeddingError::ApiRequest(format!("mock failure for {key}")));
        }
        if let Some(vector) = self.vectors.get(key) {
            return Ok(vector.clone());
        }

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();
        Ok((0..self.dimension)
            .map(|i| {
                let mixed = seed.rotate_left((i % 64) as u32) ^ (i as u64);
                ((mixed % 2000) as f32 / 1000.0) - 1.0
            })
            .collect())
    }

    fn response(&self, embedding: Embedding, index: Option<usize>) -> EmbeddingResponse {
        EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: self.default_model().to_string(),
            index,
            tokens_used: None,
        }
    }
}

fn error_for(kind: FailureKind) -> EmbeddingError {
    match kind {
        FailureKind::Unconfigured => EmbeddingError::ProviderNotConfigured,
        FailureKind::Auth => EmbeddingError::Unauthorized("invalid api key".to_string()),
        FailureKind::RateLimit => EmbeddingError::RateLimited {
            retry_after_secs: 1,
        },
        FailureKind::Network => EmbeddingError::Network("connection refused".to_string()),
        FailureKind::Other => EmbeddingError::ApiRequest("mock provider error".to_string()),
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-embedding"
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(EmbeddingError::ProviderNotConfigured);
        }
        let embedding = self.vector_for(&request.text)?;
        Ok(self.response(embedding, None))
    }

    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(requests.len());

        if !self.available {
            return Err(EmbeddingError::ProviderNotConfigured);
        }
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(EmbeddingError::ApiRequest("mock batch failure".to_string()));
        }

        let mut responses = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            let embedding = self.vector_for(&request.text)?;
            responses.push(self.response(embedding, Some(index)));
        }
        if self.reverse_batches {
            responses.reverse();
        }
        Ok(responses)
    }

    fn is_available(&self) -> bool {
        self.available
    }
}
