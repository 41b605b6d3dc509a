use anyhow::Context;
use ollama_provider::llm::{ChunkStream, ModelDescriptor};
use ollama_provider::{
    ChatMessage, ChatOptions, ChatReply, EmbedOptions, EmbeddingProvider, EmbeddingResult,
    LlmProvider, ModelSettings, ProviderInfo, ProviderRegistry, StreamChunk,
};
use serde_json::Value;
use std::sync::Arc;

/// Keeps the conversation and the model selection for one terminal session.
pub struct Agent {
    chat: Arc<dyn LlmProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    chat_settings: ModelSettings,
    embed_settings: ModelSettings,
    history: Vec<ChatMessage>,
}

impl Agent {
    pub fn new(registry: &ProviderRegistry, provider: &str) -> anyhow::Result<Self> {
        let chat = registry.llm(provider)?;
        let embedder = registry.embedding(provider)?;
        let chat_settings = chat.default_config();
        let embed_settings = embedder.default_config();

        Ok(Self {
            chat,
            embedder,
            chat_settings,
            embed_settings,
            history: Vec::new(),
        })
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_settings.model
    }

    pub async fn models(&self) -> anyhow::Result<Vec<ModelDescriptor>> {
        self.chat
            .get_models()
            .await
            .context("Failed to list local models")
    }

    pub fn set_chat_model(&mut self, model: &str) -> anyhow::Result<()> {
        self.chat.set_config(
            &mut self.chat_settings,
            "model",
            &Value::String(model.to_string()),
        )?;
        Ok(())
    }

    pub async fn embed(&self, text: &str) -> anyhow::Result<EmbeddingResult> {
        Ok(self
            .embedder
            .embed(&self.embed_settings, text, EmbedOptions::default())
            .await?)
    }

    pub async fn handle_input(&mut self, text: String) -> anyhow::Result<ChunkStream> {
        self.history.push(ChatMessage::user(text));

        let reply = self
            .chat
            .chat(
                &self.chat_settings,
                self.history.clone(),
                ChatOptions::default(),
            )
            .await;

        let response = match reply {
            Ok(ChatReply::Chunks(response)) => response,
            Ok(ChatReply::Upstream(resp)) => {
                self.history.pop();
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("Ollama answered {}: {}", status, body.trim());
            }
            Err(e) => {
                self.history.pop();
                return Err(e.into());
            }
        };

        tracing::debug!(
            "Streaming reply from {}",
            response.model().unwrap_or("unknown model")
        );
        Ok(response.body)
    }

    /// Stores the final cumulative chunk of a reply as the assistant turn.
    pub fn record_reply(&mut self, last: StreamChunk) {
        self.history.push(last.into());
    }
}
