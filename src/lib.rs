pub mod config;
pub mod error;
pub mod llm;
pub mod registry;

pub use error::{ProviderError, Result};
pub use llm::{
    register, ChatMessage, ChatOptions, ChatReply, ChatResponse, EmbedOptions, EmbeddingResult,
    ModelDescriptor, Role, StreamChunk, ToolCall, ToolDefinition,
};
pub use registry::{EmbeddingProvider, LlmProvider, ModelSettings, ProviderInfo, ProviderRegistry};
