mod common;

use common::registry_for;
use ollama_provider::{EmbedOptions, EmbeddingProvider, ModelSettings, ProviderError, ProviderInfo};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_embed(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn reshapes_first_embedding() {
    let server = MockServer::start().await;
    mount_embed(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "model": "m",
            "embeddings": [[0.1, 0.2]]
        })),
    )
    .await;

    let registry = registry_for(&server);
    let provider = registry.embedding("ollama").unwrap();
    let result = provider
        .embed(&provider.default_config(), "hello", EmbedOptions::default())
        .await
        .unwrap();

    assert_eq!(result.model, "m");
    assert_eq!(result.embeddings, vec![0.1, 0.2]);
    assert_eq!(result.length, 2);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body,
        json!({"input": ["hello"], "model": "nomic-embed-text:latest"})
    );
}

#[tokio::test]
async fn option_model_overrides_settings() {
    let server = MockServer::start().await;
    mount_embed(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "model": "all-minilm",
            "embeddings": [[1.0, 0.0, -1.0]]
        })),
    )
    .await;

    let registry = registry_for(&server);
    let provider = registry.embedding("ollama").unwrap();
    let options = EmbedOptions {
        model: Some("all-minilm".to_string()),
    };
    let result = provider
        .embed(&ModelSettings::new("nomic-embed-text:latest"), "x", options)
        .await
        .unwrap();
    assert_eq!(result.length, 3);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], json!("all-minilm"));
}

#[tokio::test]
async fn empty_embeddings_are_an_error() {
    let server = MockServer::start().await;
    mount_embed(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"model": "m", "embeddings": []})),
    )
    .await;

    let registry = registry_for(&server);
    let provider = registry.embedding("ollama").unwrap();
    let err = provider
        .embed(&provider.default_config(), "x", EmbedOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::EmptyEmbedding));
}

#[tokio::test]
async fn upstream_error_propagates() {
    let server = MockServer::start().await;
    mount_embed(
        &server,
        ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})),
    )
    .await;

    let registry = registry_for(&server);
    let provider = registry.embedding("ollama").unwrap();
    let err = provider
        .embed(&provider.default_config(), "x", EmbedOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Http(_)));
}
