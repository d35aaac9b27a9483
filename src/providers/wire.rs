// Wire-shape normalization and SSE framing helpers

use serde_json::Value;
use thiserror::Error;

use crate::types::ToolCall;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolCallParseError {
    #[error("tool call has no recognizable wire shape: {0}")]
    UnknownShape(String),
    #[error("tool call is missing a function name")]
    MissingName,
    #[error("tool call is missing a call id")]
    MissingId,
}

/// Normalize a model-issued tool call into the internal shape.
///
/// Two wire shapes exist:
///   flat:    {"id": ..., "type": "function", "function": {"name", "arguments"}}
///   chained: {"type": "function_call", "call_id": ..., "name", "arguments"}
/// Anything else is an explicit parse error, never silently dropped.
pub fn parse_tool_call(value: &Value) -> Result<ToolCall, ToolCallParseError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ToolCallParseError::UnknownShape(value.to_string()))?;

    if let Some(function) = obj.get("function").and_then(|f| f.as_object()) {
        let name = function
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or(ToolCallParseError::MissingName)?;
        let id = obj
            .get("id")
            .or_else(|| obj.get("call_id"))
            .and_then(|i| i.as_str())
            .ok_or(ToolCallParseError::MissingId)?;
        let arguments = function
            .get("arguments")
            .and_then(|a| a.as_str())
            .unwrap_or("{}");
        return Ok(ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        });
    }

    if obj.contains_key("name") {
        let name = obj
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or(ToolCallParseError::MissingName)?;
        let id = obj
            .get("call_id")
            .or_else(|| obj.get("id"))
            .and_then(|i| i.as_str())
            .ok_or(ToolCallParseError::MissingId)?;
        let arguments = obj
            .get("arguments")
            .and_then(|a| a.as_str())
            .unwrap_or("{}");
        return Ok(ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        });
    }

    Err(ToolCallParseError::UnknownShape(value.to_string()))
}

/// Flatten nested chat-style tool definitions into the chained variant's
/// shape: {"type":"function","function":{...}} -> {"type":"function", ...}.
pub fn convert_tools_for_responses(tools: &[Value]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            let function = match tool.get("function").and_then(|f| f.as_object()) {
                Some(function) if tool.get("type").and_then(|t| t.as_str()) == Some("function") => {
                    function
                }
                _ => return tool.clone(),
            };
            let mut converted = serde_json::Map::new();
            converted.insert("type".to_string(), Value::from("function"));
            for key in ["name", "description", "parameters"] {
                if let Some(value) = function.get(key) {
                    converted.insert(key.to_string(), value.clone());
                }
            }
            Value::Object(converted)
        })
        .collect()
}

/// Accumulates streamed bytes and yields complete lines, keeping the
/// trailing partial line buffered.
#[derive(Default)]
pub struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        LineBuffer::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
    }

    pub fn next_line(&mut self) -> Option<String> {
        let newline = self.buffer.find('\n')?;
        let line = self.buffer[..newline].trim().to_string();
        self.buffer = self.buffer[newline + 1..].to_string();
        Some(line)
    }
}

/// The `data:` payload of an SSE line, if the line carries one.
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}
