use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream returned no embedding vectors")]
    EmptyEmbedding,

    #[error("No provider registered under '{0}'")]
    UnknownProvider(String),
}

impl From<config::ConfigError> for ProviderError {
    fn from(err: config::ConfigError) -> Self {
        ProviderError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
