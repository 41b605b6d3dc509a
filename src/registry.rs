//! The contract a host application expects from chat and embedding providers,
//! and the registry it keeps them in.

use crate::error::{ProviderError, Result};
use crate::llm::{
    ChatMessage, ChatOptions, ChatReply, EmbedOptions, EmbeddingResult, ModelDescriptor,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Model selection for one provider, passed explicitly into every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model: String,
}

impl ModelSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    /// `requested` when it names something, otherwise the configured model.
    pub fn resolve<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .filter(|model| !model.is_empty())
            .unwrap_or(self.model.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaProperty {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
}

/// JSON-schema style description of a provider's settings form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: BTreeMap<String, SchemaProperty>,
}

impl ConfigSchema {
    /// A form with a single `model` field whose choices are fetched at runtime.
    pub fn model_picker(title: &str) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            "model".to_string(),
            SchemaProperty {
                kind: "dynamic-enum".to_string(),
                title: title.to_string(),
            },
        );
        Self {
            kind: "object".to_string(),
            properties,
        }
    }
}

/// Choices for a `dynamic-enum` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicEnum {
    #[serde(rename = "enum")]
    pub values: Vec<String>,
    #[serde(rename = "enumNames")]
    pub names: Vec<String>,
}

impl FromIterator<ModelDescriptor> for DynamicEnum {
    fn from_iter<I: IntoIterator<Item = ModelDescriptor>>(iter: I) -> Self {
        let mut options = DynamicEnum::default();
        for model in iter {
            options.values.push(model.value);
            options.names.push(model.label);
        }
        options
    }
}

#[async_trait]
pub trait ProviderInfo: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn icon(&self) -> &str;

    fn config_schema(&self) -> ConfigSchema;

    fn default_config(&self) -> ModelSettings;

    /// Builds settings from a stored config object, falling back to the
    /// default model when the object has none.
    fn load_config(&self, config: &Value) -> Result<ModelSettings> {
        let mut settings = self.default_config();
        if let Some(model) = config.get("model") {
            self.set_config(&mut settings, "model", model)?;
        }
        Ok(settings)
    }

    fn set_config(&self, settings: &mut ModelSettings, key: &str, value: &Value) -> Result<()> {
        match key {
            "model" => {
                let model = value.as_str().ok_or_else(|| {
                    ProviderError::InvalidInput(format!("model must be a string, got {}", value))
                })?;
                settings.model = model.to_string();
            }
            other => tracing::debug!("{}: ignoring unknown config key '{}'", self.name(), other),
        }
        Ok(())
    }

    async fn get_models(&self) -> Result<Vec<ModelDescriptor>>;

    async fn model_options(&self) -> Result<DynamicEnum> {
        Ok(self.get_models().await?.into_iter().collect())
    }
}

#[async_trait]
pub trait LlmProvider: ProviderInfo {
    async fn chat(
        &self,
        settings: &ModelSettings,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<ChatReply>;
}

#[async_trait]
pub trait EmbeddingProvider: ProviderInfo {
    async fn embed(
        &self,
        settings: &ModelSettings,
        input: &str,
        options: EmbedOptions,
    ) -> Result<EmbeddingResult>;
}

#[derive(Default)]
pub struct ProviderRegistry {
    llm: HashMap<String, Arc<dyn LlmProvider>>,
    embedding: HashMap<String, Arc<dyn EmbeddingProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_llm_provider(&mut self, provider: Arc<dyn LlmProvider>) {
        let name = provider.name().to_string();
        tracing::info!("Registered chat provider '{}'", name);
        if self.llm.insert(name.clone(), provider).is_some() {
            tracing::debug!("Replaced previous chat provider '{}'", name);
        }
    }

    pub fn add_embedding_provider(&mut self, provider: Arc<dyn EmbeddingProvider>) {
        let name = provider.name().to_string();
        tracing::info!("Registered embedding provider '{}'", name);
        if self.embedding.insert(name.clone(), provider).is_some() {
            tracing::debug!("Replaced previous embedding provider '{}'", name);
        }
    }

    pub fn llm(&self, name: &str) -> Result<Arc<dyn LlmProvider>> {
        self.llm
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))
    }

    pub fn embedding(&self, name: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        self.embedding
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))
    }

    pub fn llm_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.llm.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn embedding_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.embedding.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
