use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt};

/// One line typed by the user, already sorted into what it asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    ListModels,
    UseModel(String),
    Embed(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        if line == "/models" {
            return Command::ListModels;
        }
        if let Some(model) = line.strip_prefix("/model ") {
            return Command::UseModel(model.trim().to_string());
        }
        if let Some(text) = line.strip_prefix("/embed ") {
            return Command::Embed(text.trim().to_string());
        }
        Command::Chat(line.to_string())
    }
}

#[async_trait]
pub trait InputSource {
    async fn next(&mut self) -> anyhow::Result<Option<Command>>;
}

pub struct StdinInput {
    reader: io::BufReader<io::Stdin>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            reader: io::BufReader::new(io::stdin()),
        }
    }
}

#[async_trait]
impl InputSource for StdinInput {
    async fn next(&mut self) -> anyhow::Result<Option<Command>> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(Command::parse(&line)))
        }
    }
}
