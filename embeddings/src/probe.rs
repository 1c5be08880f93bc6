//! Availability probe for the remote embedding provider.
//!
//! Issues one cheap embedding request and classifies the outcome. The probe
//! never reads or writes any cache tier.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::error::FailureKind;
use crate::provider::{EmbeddingProvider, EmbeddingRequest, OpenAIProvider};

/// Fixed text sent by the probe.
pub const PROBE_TEXT: &str = "connection test";

/// Why the provider is or is not usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeReason {
    Available,
    Unconfigured,
    AuthFailed,
    RateLimited,
    NetworkError,
    UnknownError { message: String },
}

/// Result of [`probe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub available: bool,
    pub reason: ProbeReason,
}

impl ProbeResult {
    fn from_reason(reason: ProbeReason) -> Self {
        Self {
            available: reason == ProbeReason::Available,
            reason,
        }
    }
}

/// Probe the provider described by `config`.
pub async fn probe(config: &ProviderConfig) -> ProbeResult {
    if !config.is_configured() {
        return ProbeResult::from_reason(ProbeReason::Unconfigured);
    }

    match OpenAIProvider::from_config(config) {
        Ok(provider) => probe_provider(&provider).await,
        Err(e) => ProbeResult::from_reason(ProbeReason::UnknownError {
            message: e.to_string(),
        }),
    }
}

/// Probe an already constructed provider.
pub async fn probe_provider(provider: &dyn EmbeddingProvider) -> ProbeResult {
    if !provider.is_available() {
        return ProbeResult::from_reason(ProbeReason::Unconfigured);
    }

    let reason = match provider.embed(EmbeddingRequest::new(PROBE_TEXT)).await {
        Ok(response) => {
            debug!(dimension = response.dimension, "Provider probe succeeded");
            ProbeReason::Available
        }
        Err(e) => match e.failure_kind() {
            FailureKind::Unconfigured => ProbeReason::Unconfigured,
            FailureKind::Auth => ProbeReason::AuthFailed,
            FailureKind::RateLimit => ProbeReason::RateLimited,
            FailureKind::Network => ProbeReason::NetworkError,
            FailureKind::Other => ProbeReason::UnknownError {
                message: e.to_string(),
            },
        },
    };

    info!(provider = provider.name(), ?reason, "Embedding provider probed");
    ProbeResult::from_reason(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_missing_key_is_unconfigured() {
        let result = probe(&ProviderConfig::default()).await;
        assert_eq!(
            result,
            ProbeResult {
                available: false,
                reason: ProbeReason::Unconfigured
            }
        );
    }

    #[tokio::test]
    async fn test_classifies_provider_failures() {
        let cases = [
            (FailureKind::Auth, ProbeReason::AuthFailed),
            (FailureKind::RateLimit, ProbeReason::RateLimited),
            (FailureKind::Network, ProbeReason::NetworkError),
            (FailureKind::Unconfigured, ProbeReason::Unconfigured),
        ];
        for (kind, expected) in cases {
            let provider = MockProvider::new(4).with_failure(kind);
            let result = probe_provider(&provider).await;
            assert!(!result.available);
            assert_eq!(result.reason, expected);
        }
    }

    #[tokio::test]
    async fn test_unknown_error_carries_message() {
        let provider = MockProvider::new(4).with_failure(FailureKind::Other);
        let result = probe_provider(&provider).await;
        assert_eq!(
            result.reason,
            ProbeReason::UnknownError {
                message: "API request failed: mock provider error".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_success_is_available() {
        let provider = MockProvider::new(4);
        let result = probe_provider(&provider).await;
        assert!(result.available);
        assert_eq!(result.reason, ProbeReason::Available);
        assert_eq!(provider.embed_calls(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_provider_is_not_called() {
        let provider = MockProvider::new(4).unavailable();
        let result = probe_provider(&provider).await;
        assert_eq!(result.reason, ProbeReason::Unconfigured);
        assert_eq!(provider.embed_calls(), 0);
    }
}
