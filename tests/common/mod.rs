#![allow(dead_code)]

use futures_util::StreamExt;
use ollama_provider::config::OllamaConfig;
use ollama_provider::{register, ChatResponse, ProviderRegistry, Result, StreamChunk};
use wiremock::MockServer;

/// A registry whose Ollama providers point at `server`.
pub fn registry_for(server: &MockServer) -> ProviderRegistry {
    let config = OllamaConfig {
        base_url: server.uri(),
        ..Default::default()
    };
    let mut registry = ProviderRegistry::new();
    register(&mut registry, &config).expect("register ollama providers");
    registry
}

/// Newline-delimited JSON body as Ollama streams it.
pub fn ndjson(lines: &[serde_json::Value]) -> String {
    lines
        .iter()
        .map(|line| format!("{}\n", line))
        .collect::<String>()
}

pub async fn drain(response: ChatResponse) -> Vec<Result<StreamChunk>> {
    response.body.collect().await
}
