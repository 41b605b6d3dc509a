//! Recovers a tool invocation that a model wrote out as plain text.
//!
//! Some models served by Ollama ignore the native `tool_calls` field and
//! instead answer with a JSON object, optionally wrapped in
//! `<tool_call>...</tool_call>` tags. Once a stream has finished, the
//! accumulated content is checked for that shape.

use crate::llm::{ToolCall, ToolDefinition};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TOOL_CALL_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").expect("tool call pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallParse {
    Found(ToolCall),
    PlainText,
}

/// Returns the trimmed body of the first `<tool_call>` block, if any.
pub fn extract_tagged(text: &str) -> Option<&str> {
    TOOL_CALL_TAG
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|inner| !inner.is_empty())
}

/// Interprets `content` as a call to one of `tools`.
///
/// The object must carry a `name` naming an offered tool and a non-null
/// `parameters` or `arguments` (the former wins when both are present).
/// Anything else is [`ToolCallParse::PlainText`].
pub fn parse_tool_call(content: &str, tools: Option<&[ToolDefinition]>) -> ToolCallParse {
    let Some(tools) = tools else {
        return ToolCallParse::PlainText;
    };

    let candidate = extract_tagged(content).unwrap_or(content);
    let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(candidate) else {
        return ToolCallParse::PlainText;
    };

    let name = match object.get("name") {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => return ToolCallParse::PlainText,
    };

    let arguments = match (object.remove("parameters"), object.remove("arguments")) {
        (Some(params), _) if !params.is_null() => params,
        (_, Some(args)) if !args.is_null() => args,
        _ => return ToolCallParse::PlainText,
    };

    if !tools.iter().any(|tool| tool.function.name == name) {
        tracing::debug!("Model named unknown tool '{}', treating as text", name);
        return ToolCallParse::PlainText;
    }

    let id = chrono::Utc::now().timestamp_millis().to_string();
    tracing::debug!("Recovered tool call '{}' from content", name);
    ToolCallParse::Found(ToolCall::function(id, name, arguments))
}
