use anyhow::{Context, Result};
use async_trait::async_trait;
use ollama_provider::StreamChunk;
use tokio::io::{self, AsyncWriteExt};

#[async_trait]
pub trait OutputSink {
    async fn emit(&mut self, text: &str) -> Result<()>;
    /// Renders one cumulative chunk of the reply currently streaming.
    async fn emit_chunk(&mut self, chunk: &StreamChunk) -> Result<()>;
    /// Ends the current reply and resets chunk tracking.
    async fn finish_reply(&mut self) -> Result<()>;
    async fn emit_error(&mut self, error: &str) -> Result<()>;
}

pub struct StdoutOutput {
    buffer: Vec<u8>,
    printed: usize,
}

impl StdoutOutput {
    pub fn new() -> Self {
        tracing::debug!("Initializing stdout output");
        Self {
            buffer: Vec::with_capacity(4096),
            printed: 0,
        }
    }

    async fn flush_buffer(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            let mut stdout = io::stdout();
            stdout
                .write_all(&self.buffer)
                .await
                .context("Failed to write to stdout")?;
            stdout.flush().await.context("Failed to flush stdout")?;
            self.buffer.clear();
        }
        Ok(())
    }
}

/// The part of `content` not shown yet, given `printed` bytes already shown.
fn unseen_tail(content: &str, printed: usize) -> &str {
    content.get(printed..).unwrap_or_default()
}

#[async_trait]
impl OutputSink for StdoutOutput {
    async fn emit(&mut self, text: &str) -> Result<()> {
        self.buffer.extend_from_slice(text.as_bytes());
        self.buffer.push(b'\n');
        self.flush_buffer().await
    }

    async fn emit_chunk(&mut self, chunk: &StreamChunk) -> Result<()> {
        let tail = unseen_tail(&chunk.content, self.printed);
        self.buffer.extend_from_slice(tail.as_bytes());
        self.printed = chunk.content.len();

        if let Some(calls) = &chunk.tool_calls {
            for call in calls {
                let line = format!(
                    "\n[tool call {}] {}({})",
                    call.id, call.function.name, call.function.arguments
                );
                self.buffer.extend_from_slice(line.as_bytes());
            }
        }

        // Tokens arrive a few bytes at a time; flush per chunk so they show up live.
        self.flush_buffer().await
    }

    async fn finish_reply(&mut self) -> Result<()> {
        tracing::debug!("Reply finished after {} bytes", self.printed);
        self.printed = 0;
        self.buffer.extend_from_slice(b"\n\n");
        self.flush_buffer().await
    }

    async fn emit_error(&mut self, error: &str) -> Result<()> {
        let mut stderr = io::stderr();
        stderr
            .write_all(format!("Error: {}\n", error).as_bytes())
            .await
            .context("Failed to write to stderr")?;
        stderr.flush().await.context("Failed to flush stderr")?;
        Ok(())
    }
}

impl Default for StdoutOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StdoutOutput {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            tracing::warn!(
                "Output buffer not flushed, {} bytes lost",
                self.buffer.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_of_cumulative_content() {
        assert_eq!(unseen_tail("Hi there", 2), " there");
        assert_eq!(unseen_tail("Hi", 2), "");
        assert_eq!(unseen_tail("Hi", 0), "Hi");
    }

    #[test]
    fn tail_past_end_is_empty() {
        assert_eq!(unseen_tail("Hi", 10), "");
    }
}
