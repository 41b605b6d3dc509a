use crate::error::{ProviderError, Result};
use crate::llm::stream::chunk_stream;
use crate::llm::{
    lenient_role, ChatMessage, ChatReply, ChatResponse, ChunkStream, EmbeddingResult,
    ModelDescriptor, Role, StreamChunk, ToolCall, ToolDefinition,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    model: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default, deserialize_with = "lenient_role")]
    role: Option<Role>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

impl From<CompletionMessage> for StreamChunk {
    fn from(message: CompletionMessage) -> Self {
        Self {
            role: message.role.unwrap_or_default(),
            content: message.content,
            tool_calls: message.tool_calls,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: [&'a str; 1],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    model: String,
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<LocalModel>,
}

#[derive(Debug, Deserialize)]
struct LocalModel {
    name: String,
}

pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        if base_url.is_empty() {
            return Err(ProviderError::InvalidInput(
                "base_url cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        let tags: TagsResponse = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::debug!("Ollama reports {} local models", tags.models.len());

        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelDescriptor {
                label: m.name.clone(),
                value: m.name,
            })
            .collect())
    }

    /// Sends a chat turn to `/api/chat`.
    ///
    /// A non-2xx answer is returned as [`ChatReply::Upstream`] without being
    /// read. Otherwise the body becomes a chunk stream: a single chunk when
    /// not streaming, one cumulative chunk per upstream line when streaming.
    pub async fn chat(
        &self,
        mut messages: Vec<ChatMessage>,
        model: &str,
        stream: bool,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatReply> {
        normalize_tool_arguments(&mut messages)?;

        tracing::debug!(
            "Sending {} messages to Ollama model {} (stream: {})",
            messages.len(),
            model,
            stream
        );

        let request = ChatRequest {
            messages: &messages,
            model,
            stream,
            tools: tools.as_deref(),
        };

        let resp = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            tracing::warn!("Ollama chat returned {}", resp.status());
            return Ok(ChatReply::Upstream(resp));
        }

        let body: ChunkStream = if stream {
            chunk_stream(resp.bytes_stream(), tools)
        } else {
            let completion: ChatCompletion = resp.json().await?;
            let chunk = StreamChunk::from(completion.message);
            Box::pin(futures_util::stream::once(async move { Ok(chunk) }))
        };

        Ok(ChatReply::Chunks(ChatResponse::new(model, stream, body)))
    }

    pub async fn embed(&self, input: &str, model: &str) -> Result<EmbeddingResult> {
        tracing::debug!(
            "Embedding {} chars with Ollama model {}",
            input.len(),
            model
        );

        let request = EmbedRequest {
            input: [input],
            model,
        };

        let resp: EmbedResponse = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let embeddings = resp
            .embeddings
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyEmbedding)?;

        Ok(EmbeddingResult {
            model: resp.model,
            length: embeddings.len(),
            embeddings,
        })
    }
}

/// Ollama wants tool call arguments as JSON objects, while hosts usually
/// carry them as serialized strings.
pub(crate) fn normalize_tool_arguments(messages: &mut [ChatMessage]) -> Result<()> {
    let calls = messages
        .iter_mut()
        .filter_map(|m| m.tool_calls.as_mut())
        .flatten();

    for call in calls {
        if let Value::String(raw) = &call.function.arguments {
            call.function.arguments = if raw.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(raw)?
            };
        }
    }

    Ok(())
}
