//! HTTP-level tests for the OpenAI-compatible provider and the probe.
//!
//! A wiremock server stands in for the embeddings endpoint.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use triage_embeddings::{
    BatchFetcher, Embeddable, Embedding, EmbeddingError, EmbeddingProvider, EmbeddingRequest,
    FetchConfig, NoopDurableStore, OpenAIProvider, ProbeReason, ProviderConfig,
    TieredEmbeddingStore, probe,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ProviderConfig {
    ProviderConfig::new("sk-test")
        .with_base_url(server.uri())
        .with_timeout_secs(5)
}

async fn respond_with(status: u16, body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    server
}

struct Doc {
    id: String,
}

impl Embeddable for Doc {
    fn embedding_id(&self) -> &str {
        &self.id
    }

    fn stored_embedding(&self) -> Option<&Embedding> {
        None
    }

    fn embedding_text(&self) -> String {
        format!("{}\nbody", self.id)
    }
}

#[tokio::test]
async fn test_single_embedding_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.1, 0.2, 0.3] }],
            "model": "text-embedding-3-small",
            "usage": { "prompt_tokens": 2, "total_tokens": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAIProvider::from_config(&config_for(&server)).unwrap();
    let response = provider.embed(EmbeddingRequest::new("hello")).await.unwrap();

    assert_eq!(response.embedding, vec![0.1, 0.2, 0.3]);
    assert_eq!(response.dimension, 3);
    assert_eq!(response.tokens_used, Some(2));
}

#[tokio::test]
async fn test_batch_response_is_reassociated_by_index() {
    let server = respond_with(
        200,
        json!({
            "data": [
                { "index": 2, "embedding": [2.0] },
                { "index": 0, "embedding": [0.0] },
                { "index": 1, "embedding": [1.0] }
            ],
            "model": "text-embedding-3-small"
        }),
    )
    .await;

    let provider = OpenAIProvider::from_config(&config_for(&server)).unwrap();
    let store = TieredEmbeddingStore::new(Arc::new(provider), Arc::new(NoopDurableStore));
    let fetcher = BatchFetcher::new(Arc::new(store), FetchConfig::default());
    let docs: Vec<Doc> = (0..3).map(|i| Doc { id: format!("D-{i}") }).collect();

    let resolved = fetcher.resolve_many(&docs).await;

    assert_eq!(resolved["D-0"], vec![0.0]);
    assert_eq!(resolved["D-1"], vec![1.0]);
    assert_eq!(resolved["D-2"], vec![2.0]);
}

#[tokio::test]
async fn test_status_codes_map_to_error_classes() {
    let server = respond_with(401, json!({ "error": { "message": "bad key" } })).await;
    let provider = OpenAIProvider::from_config(&config_for(&server)).unwrap();
    let err = provider.embed(EmbeddingRequest::new("x")).await.unwrap_err();
    assert!(matches!(err, EmbeddingError::Unauthorized(_)));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;
    let provider = OpenAIProvider::from_config(&config_for(&server)).unwrap();
    let err = provider.embed(EmbeddingRequest::new("x")).await.unwrap_err();
    assert!(matches!(
        err,
        EmbeddingError::RateLimited {
            retry_after_secs: 7
        }
    ));
}

#[tokio::test]
async fn test_probe_reports_available() {
    let server = respond_with(
        200,
        json!({
            "data": [{ "index": 0, "embedding": [0.5, 0.5] }],
            "model": "text-embedding-3-small"
        }),
    )
    .await;

    let result = probe(&config_for(&server)).await;
    assert!(result.available);
    assert_eq!(result.reason, ProbeReason::Available);
}

#[tokio::test]
async fn test_probe_reports_auth_and_rate_limit() {
    let server = respond_with(403, json!({})).await;
    assert_eq!(probe(&config_for(&server)).await.reason, ProbeReason::AuthFailed);

    let server = respond_with(429, json!({})).await;
    assert_eq!(probe(&config_for(&server)).await.reason, ProbeReason::RateLimited);
}

#[tokio::test]
async fn test_probe_reports_unknown_error_for_server_failure() {
    let server = respond_with(500, json!({ "error": "boom" })).await;
    let result = probe(&config_for(&server)).await;
    assert!(!result.available);
    assert!(matches!(result.reason, ProbeReason::UnknownError { .. }));
}

#[tokio::test]
async fn test_probe_reports_network_error_when_unreachable() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    drop(server);

    let result = probe(&config).await;
    assert_eq!(result.reason, ProbeReason::NetworkError);
}

#[tokio::test]
async fn test_timeout_is_a_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_secs(3))
                .set_body_json(json!({ "data": [], "model": "m" })),
        )
        .mount(&server)
        .await;

    let provider =
        OpenAIProvider::from_config(&config_for(&server).with_timeout_secs(1)).unwrap();
    let err = provider.embed(EmbeddingRequest::new("x")).await.unwrap_err();
    assert!(matches!(err, EmbeddingError::Network(_)));
}
