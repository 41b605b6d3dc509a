use crate::error::{ProviderError, Result};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_CHAT_MODEL: &str = "qwen2.5:7b";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text:latest";

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}
fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}
// Streaming generations on local hardware easily outlive a short request timeout.
fn default_timeout() -> u64 {
    300
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub ollama: OllamaConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        tracing::info!("Loading configuration from: {}", path.display());

        let cfg = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()
            .map_err(|e| ProviderError::Config(format!("Failed to build config: {}", e)))?;

        let cfg: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| ProviderError::Config(format!("Failed to deserialize: {}", e)))?;

        cfg.validate()?;

        tracing::info!("Configuration loaded successfully");
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let ollama = &self.ollama;

        if ollama.base_url.is_empty() {
            return Err(ProviderError::Config("base_url cannot be empty".to_string()));
        }

        if !ollama.base_url.starts_with("http://") && !ollama.base_url.starts_with("https://") {
            return Err(ProviderError::Config(
                "base_url must start with http:// or https://".to_string(),
            ));
        }

        if ollama.chat_model.is_empty() {
            return Err(ProviderError::Config("chat_model cannot be empty".to_string()));
        }

        if ollama.embedding_model.is_empty() {
            return Err(ProviderError::Config(
                "embedding_model cannot be empty".to_string(),
            ));
        }

        if ollama.timeout_secs == 0 {
            return Err(ProviderError::Config(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }
}
