pub mod ollama;
pub mod provider;
pub mod stream;
pub mod tool_call;

use crate::error::Result;
use futures_util::Stream;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::pin::Pin;

pub use ollama::OllamaClient;
pub use provider::{register, OllamaChatProvider, OllamaEmbeddingProvider};

/// Header carrying the model that served a chat response.
pub const MODEL_HEADER: &str = "model";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Assistant,
    User,
    System,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Structured JSON upstream; hosts may hand it in as a serialized string.
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    #[serde(default, deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

// Hosts echo back the numeric timestamp ids this adapter hands out.
fn id_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "tool call id must be a string or number, got {}",
            other
        ))),
    }
}

/// Reads a role that may be empty or unknown to this crate as `None`, so the
/// rest of the message still decodes.
pub(crate) fn lenient_role<'de, D>(deserializer: D) -> std::result::Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|role| serde_json::from_value(Value::String(role)).ok()))
}

impl ToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            kind: function_kind(),
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Fields such as `images` or `tool_name`, forwarded upstream untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            extra: Map::new(),
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A tool offered to the model. Only `function.name` is interpreted here;
/// every other field is forwarded upstream as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>, parameters: Value) -> Self {
        let mut extra = Map::new();
        extra.insert("parameters".to_string(), parameters);
        Self {
            kind: function_kind(),
            function: FunctionDefinition {
                name: name.into(),
                extra,
            },
        }
    }
}

/// Cumulative view of a chat response as seen by the host.
///
/// While streaming, `content` only ever grows and each emitted chunk carries
/// everything received so far, so consumers replace their state with the
/// latest chunk rather than appending to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Default for StreamChunk {
    fn default() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: None,
        }
    }
}

impl From<ChatMessage> for StreamChunk {
    fn from(message: ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content,
            tool_calls: message.tool_calls,
        }
    }
}

impl From<StreamChunk> for ChatMessage {
    fn from(chunk: StreamChunk) -> Self {
        Self {
            role: chunk.role,
            content: chunk.content,
            tool_calls: chunk.tool_calls,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub model: String,
    pub embeddings: Vec<f32>,
    pub length: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Streams unless explicitly disabled.
    pub stream: Option<bool>,
    pub model: Option<String>,
    pub tools: Option<Vec<ToolDefinition>>,
}

impl ChatOptions {
    pub fn streaming(&self) -> bool {
        self.stream.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmbedOptions {
    pub model: Option<String>,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

pub struct ChatResponse {
    pub headers: HeaderMap,
    pub body: ChunkStream,
}

impl ChatResponse {
    pub(crate) fn new(model: &str, streaming: bool, body: ChunkStream) -> Self {
        let mut headers = HeaderMap::new();
        let content_type = if streaming {
            "text/event-stream"
        } else {
            "application/json"
        };
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        match HeaderValue::from_str(model) {
            Ok(value) => {
                headers.insert(MODEL_HEADER, value);
            }
            Err(_) => tracing::warn!("Model name {:?} is not a valid header value", model),
        }
        Self { headers, body }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn model(&self) -> Option<&str> {
        self.headers.get(MODEL_HEADER).and_then(|v| v.to_str().ok())
    }
}

pub enum ChatReply {
    Chunks(ChatResponse),
    /// Non-2xx answer from upstream, handed back untouched.
    Upstream(reqwest::Response),
}

impl ChatReply {
    pub fn into_chunks(self) -> std::result::Result<ChatResponse, reqwest::Response> {
        match self {
            ChatReply::Chunks(response) => Ok(response),
            ChatReply::Upstream(response) => Err(response),
        }
    }
}
