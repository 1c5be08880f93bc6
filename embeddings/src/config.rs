//! Configuration for the embedding provider and the batch fetcher.

use serde::{Deserialize, Serialize};

/// Default OpenAI-compatible API base.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Connection settings for the remote embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API base URL, without the trailing `/embeddings`.
    pub base_url: String,

    /// Bearer credential. `None` or blank means unconfigured.
    pub api_key: Option<String>,

    /// Model identifier.
    pub model: String,

    /// Output dimensions, if the model supports shortening.
    pub dimensions: Option<usize>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Create a configuration with the given API key and default endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Build from the environment (`OPENAI_API_KEY`).
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            ..Self::default()
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Whether a usable credential is present.
    pub fn is_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            dimensions: None,
            timeout_secs: 30,
        }
    }
}

/// Settings for [`crate::BatchFetcher`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of texts per provider request.
    pub batch_size: usize,

    /// Maximum number of batches in flight per window.
    pub concurrency: usize,

    /// Estimated-token ceiling for a single provider request.
    pub token_ceiling: usize,

    /// Characters per token used for the estimate.
    pub chars_per_token: usize,
}

impl FetchConfig {
    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the window concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the token ceiling.
    pub fn with_token_ceiling(mut self, token_ceiling: usize) -> Self {
        self.token_ceiling = token_ceiling;
        self
    }

    pub(crate) fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub(crate) fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            concurrency: 3,
            token_ceiling: 8000,
            chars_per_token: 4,
        }
    }
}
