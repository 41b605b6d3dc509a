use crate::config::{OllamaConfig, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL};
use crate::error::Result;
use crate::llm::{
    ChatMessage, ChatOptions, ChatReply, EmbedOptions, EmbeddingResult, ModelDescriptor,
    OllamaClient,
};
use crate::registry::{
    ConfigSchema, EmbeddingProvider, LlmProvider, ModelSettings, ProviderInfo, ProviderRegistry,
};
use async_trait::async_trait;
use std::sync::Arc;

pub const PROVIDER_NAME: &str = "ollama";
pub const PROVIDER_DESCRIPTION: &str = "Get up and running with large language models.";
pub const PROVIDER_ICON: &str =
    "https://github.com/ollama/ollama/assets/3325447/0d0b44e2-8f4a-4e99-9b52-a5c1c741c8f7";

pub struct OllamaChatProvider {
    client: Arc<OllamaClient>,
    default_model: String,
}

impl OllamaChatProvider {
    pub fn new(client: Arc<OllamaClient>) -> Self {
        Self::with_default_model(client, DEFAULT_CHAT_MODEL)
    }

    pub fn with_default_model(client: Arc<OllamaClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            default_model: model.into(),
        }
    }
}

#[async_trait]
impl ProviderInfo for OllamaChatProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn description(&self) -> &str {
        PROVIDER_DESCRIPTION
    }

    fn icon(&self) -> &str {
        PROVIDER_ICON
    }

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::model_picker("Chat Model")
    }

    fn default_config(&self) -> ModelSettings {
        ModelSettings::new(self.default_model.clone())
    }

    async fn get_models(&self) -> Result<Vec<ModelDescriptor>> {
        self.client.list_models().await
    }
}

#[async_trait]
impl LlmProvider for OllamaChatProvider {
    async fn chat(
        &self,
        settings: &ModelSettings,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<ChatReply> {
        let stream = options.streaming();
        let model = settings.resolve(options.model.as_deref());
        self.client.chat(messages, model, stream, options.tools).await
    }
}

pub struct OllamaEmbeddingProvider {
    client: Arc<OllamaClient>,
    default_model: String,
}

impl OllamaEmbeddingProvider {
    pub fn new(client: Arc<OllamaClient>) -> Self {
        Self::with_default_model(client, DEFAULT_EMBEDDING_MODEL)
    }

    pub fn with_default_model(client: Arc<OllamaClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            default_model: model.into(),
        }
    }
}

#[async_trait]
impl ProviderInfo for OllamaEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn description(&self) -> &str {
        PROVIDER_DESCRIPTION
    }

    fn icon(&self) -> &str {
        PROVIDER_ICON
    }

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::model_picker("Embedding Model")
    }

    fn default_config(&self) -> ModelSettings {
        ModelSettings::new(self.default_model.clone())
    }

    async fn get_models(&self) -> Result<Vec<ModelDescriptor>> {
        self.client.list_models().await
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(
        &self,
        settings: &ModelSettings,
        input: &str,
        options: EmbedOptions,
    ) -> Result<EmbeddingResult> {
        let model = settings.resolve(options.model.as_deref());
        self.client.embed(input, model).await
    }
}

/// Registers the Ollama chat and embedding providers, sharing one HTTP client.
pub fn register(registry: &mut ProviderRegistry, config: &OllamaConfig) -> Result<()> {
    let client = Arc::new(OllamaClient::new(&config.base_url, config.timeout_secs)?);

    registry.add_llm_provider(Arc::new(OllamaChatProvider::with_default_model(
        client.clone(),
        config.chat_model.clone(),
    )));
    registry.add_embedding_provider(Arc::new(OllamaEmbeddingProvider::with_default_model(
        client,
        config.embedding_model.clone(),
    )));

    Ok(())
}
