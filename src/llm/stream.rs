//! Re-frames Ollama's JSON Lines chat stream into cumulative [`StreamChunk`]s.
//!
//! Every decoded line updates one shared accumulator and a snapshot of it is
//! emitted, so each chunk holds the full content received so far. When the
//! upstream body ends, the content is checked for a textual tool call and,
//! if one is found, a last chunk carrying it is emitted before closing.

use crate::error::{ProviderError, Result};
use crate::llm::tool_call::{parse_tool_call, ToolCallParse};
use crate::llm::{lenient_role, ChunkStream, Role, StreamChunk, ToolDefinition};
use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;

#[derive(Debug, Deserialize)]
struct ChatEnvelope {
    #[serde(default)]
    message: Option<EnvelopeMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeMessage {
    #[serde(default, deserialize_with = "lenient_role")]
    role: Option<Role>,
    #[serde(default)]
    content: Option<String>,
}

/// Splits a byte stream into text lines, holding back partial lines and
/// incomplete UTF-8 sequences until the rest arrives.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
    // Bytes of `pending` already known to hold no newline.
    scanned: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.pending[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            lines.push(
                String::from_utf8_lossy(&self.pending[start..end])
                    .trim()
                    .to_string(),
            );
            start = end + 1;
            from = start;
        }
        self.pending.drain(..start);
        self.scanned = self.pending.len();
        lines
    }

    /// Whatever is left once upstream has closed.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        self.scanned = 0;
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        Some(line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    Closed,
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

struct ChunkState {
    upstream: ByteStream,
    decoder: LineDecoder,
    chunk: StreamChunk,
    ready: VecDeque<StreamChunk>,
    tools: Option<Vec<ToolDefinition>>,
    phase: Phase,
}

impl ChunkState {
    fn absorb_line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }

        let envelope: ChatEnvelope = match serde_json::from_str(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Skipping undecodable stream line ({}): {}", e, line);
                return;
            }
        };

        if let Some(error) = envelope.error {
            tracing::warn!("Ollama reported an error mid-stream: {}", error);
        }

        if let Some(message) = envelope.message {
            if let Some(role) = message.role {
                self.chunk.role = role;
            }
            if let Some(content) = message.content {
                self.chunk.content.push_str(&content);
            }
        }

        self.ready.push_back(self.chunk.clone());
    }

    fn finish(&mut self) {
        if let Some(line) = self.decoder.finish() {
            self.absorb_line(&line);
        }

        match parse_tool_call(&self.chunk.content, self.tools.as_deref()) {
            ToolCallParse::Found(call) => {
                let mut last = self.chunk.clone();
                last.tool_calls = Some(vec![call]);
                self.ready.push_back(last);
            }
            ToolCallParse::PlainText => {}
        }

        tracing::debug!(
            "Chat stream finished, {} chars accumulated",
            self.chunk.content.len()
        );
        self.phase = Phase::Closed;
    }
}

/// Builds the host-facing chunk stream from a raw upstream body.
///
/// A transport error yields one `Err` item and ends the stream.
pub fn chunk_stream<S, E>(upstream: S, tools: Option<Vec<ToolDefinition>>) -> ChunkStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<ProviderError>,
{
    let upstream: ByteStream = Box::pin(upstream.map(|item| item.map_err(Into::into)));
    let state = ChunkState {
        upstream,
        decoder: LineDecoder::new(),
        chunk: StreamChunk::default(),
        ready: VecDeque::new(),
        tools,
        phase: Phase::Reading,
    };

    let chunks = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.ready.pop_front() {
                return Some((Ok(chunk), state));
            }
            if state.phase == Phase::Closed {
                return None;
            }

            match state.upstream.next().await {
                Some(Ok(bytes)) => {
                    for line in state.decoder.push(&bytes) {
                        state.absorb_line(&line);
                    }
                }
                Some(Err(e)) => {
                    tracing::error!("Chat stream failed: {}", e);
                    state.ready.clear();
                    state.phase = Phase::Closed;
                    return Some((Err(e), state));
                }
                None => state.finish(),
            }
        }
    });

    Box::pin(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn body(parts: &[&str]) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> {
        let parts: Vec<_> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect();
        stream::iter(parts)
    }

    fn chunk(content: &str) -> StreamChunk {
        StreamChunk {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: None,
        }
    }

    async fn collect(stream: ChunkStream) -> Vec<Result<StreamChunk>> {
        stream.collect().await
    }

    #[test]
    fn decoder_joins_lines_split_across_reads() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"{\"a\":").is_empty());
        assert_eq!(decoder.push(b"1}\n{\"b\""), vec!["{\"a\":1}".to_string()]);
        assert_eq!(decoder.finish(), Some("{\"b\"".to_string()));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn decoder_keeps_split_utf8_intact() {
        let mut decoder = LineDecoder::new();
        let text = "héllo\n".as_bytes();
        assert!(decoder.push(&text[..2]).is_empty());
        assert_eq!(decoder.push(&text[2..]), vec!["héllo".to_string()]);
    }

    #[tokio::test]
    async fn emits_cumulative_content() {
        let upstream = body(&[
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hi\"}}\n",
            "{\"message\":{\"content\":\" there\"}}\n",
        ]);
        let chunks: Vec<_> = collect(chunk_stream(upstream, None))
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(chunks, vec![chunk("Hi"), chunk("Hi there")]);
    }

    #[tokio::test]
    async fn malformed_line_is_skipped() {
        let upstream = body(&[
            "{\"message\":{\"content\":\"a\"}}\n",
            "{not json\n",
            "\n",
            "{\"message\":{\"content\":\"b\"}}\n",
        ]);
        let chunks: Vec<_> = collect(chunk_stream(upstream, None))
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(chunks, vec![chunk("a"), chunk("ab")]);
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_flushed() {
        let upstream = body(&["{\"message\":{\"content\":\"x\"}}\n{\"message\":{\"content\":\"y\"}}"]);
        let chunks: Vec<_> = collect(chunk_stream(upstream, None))
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(chunks, vec![chunk("x"), chunk("xy")]);
    }

    #[tokio::test]
    async fn latest_role_wins() {
        let upstream = body(&[
            "{\"message\":{\"role\":\"tool\",\"content\":\"a\"}}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"b\"}}\n",
        ]);
        let chunks: Vec<_> = collect(chunk_stream(upstream, None)).await;
        assert_eq!(chunks[0].as_ref().unwrap().role, Role::Tool);
        assert_eq!(chunks[1].as_ref().unwrap().role, Role::Assistant);
    }

    #[test]
    fn decoder_handles_long_line_over_many_reads() {
        let mut decoder = LineDecoder::new();
        let line = "x".repeat(10_000);
        for piece in line.as_bytes().chunks(7) {
            assert!(decoder.push(piece).is_empty());
        }
        assert_eq!(decoder.push(b"\nnext\nrest"), vec![line, "next".to_string()]);
        assert_eq!(decoder.finish(), Some("rest".to_string()));
    }

    #[tokio::test]
    async fn empty_or_unknown_role_keeps_content() {
        let upstream = body(&[
            "{\"message\":{\"role\":\"assistant\",\"content\":\"a\"}}\n",
            "{\"message\":{\"role\":\"\",\"content\":\"b\"}}\n",
            "{\"message\":{\"role\":\"thinking\",\"content\":\"c\"}}\n",
        ]);
        let chunks: Vec<_> = collect(chunk_stream(upstream, None))
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(chunks, vec![chunk("a"), chunk("ab"), chunk("abc")]);
    }

    #[tokio::test]
    async fn unknown_role_keeps_previous_role() {
        let upstream = body(&[
            "{\"message\":{\"role\":\"tool\",\"content\":\"a\"}}\n",
            "{\"message\":{\"role\":\"thinking\",\"content\":\"b\"}}\n",
        ]);
        let chunks: Vec<_> = collect(chunk_stream(upstream, None)).await;
        let last = chunks[1].as_ref().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.content, "ab");
    }

    #[tokio::test]
    async fn error_envelope_still_emits_chunk() {
        let upstream = body(&[
            "{\"message\":{\"content\":\"a\"}}\n",
            "{\"error\":\"boom\"}\n",
        ]);
        let chunks = collect(chunk_stream(upstream, None)).await;
        assert_eq!(chunks.len(), 2);
        for item in &chunks {
            assert_eq!(item.as_ref().unwrap(), &chunk("a"));
        }
    }

    #[tokio::test]
    async fn textual_tool_call_adds_final_chunk() {
        let upstream = body(&[
            "{\"message\":{\"role\":\"assistant\",\"content\":\"<tool_call>{\\\"name\\\":\\\"foo\\\",\"}}\n",
            "{\"message\":{\"content\":\"\\\"arguments\\\":{\\\"x\\\":1}}</tool_call>\"}}\n",
            "{\"message\":{\"content\":\"\"},\"done\":true}\n",
        ]);
        let tools = vec![ToolDefinition::function("foo", json!({"type": "object"}))];
        let chunks: Vec<_> = collect(chunk_stream(upstream, Some(tools)))
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();

        assert_eq!(chunks.len(), 4);
        assert!(chunks[..3].iter().all(|c| c.tool_calls.is_none()));
        let last = &chunks[3];
        assert_eq!(
            last.content,
            r#"<tool_call>{"name":"foo","arguments":{"x":1}}</tool_call>"#
        );
        let calls = last.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "foo");
        assert_eq!(calls[0].function.arguments, json!({"x": 1}));
    }

    #[tokio::test]
    async fn non_json_content_closes_quietly() {
        let upstream = body(&["{\"message\":{\"content\":\"just words\"}}\n"]);
        let tools = vec![ToolDefinition::function("foo", json!({}))];
        let chunks: Vec<_> = collect(chunk_stream(upstream, Some(tools))).await;
        assert_eq!(chunks.len(), 1);
        let only = chunks[0].as_ref().unwrap();
        assert_eq!(only.content, "just words");
        assert!(only.tool_calls.is_none());
    }

    #[tokio::test]
    async fn transport_error_terminates_stream() {
        let parts: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"message\":{\"content\":\"a\"}}\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"{\"message\":{\"content\":\"b\"}}\n")),
        ];
        let chunks = collect(chunk_stream(stream::iter(parts), None)).await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap().content, "a");
        assert!(matches!(chunks[1], Err(ProviderError::Io(_))));
    }
}
