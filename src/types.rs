// Shared message, tool-call and response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// One typed part of a multimodal message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Parts(_) => None,
        }
    }

    /// Flatten to plain text; image parts contribute nothing.
    pub fn to_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A single conversation message. Tool messages carry the correlation id of
/// the tool call they answer; assistant messages may echo the tool calls the
/// model issued (the flat protocol variant requires that echo).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Message {
            role,
            content: MessageContent::Text(content.into()),
            tool_call_id: None,
            name: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::text(Role::Tool, content);
        msg.tool_call_id = Some(call_id.into());
        msg
    }

    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::text(Role::Assistant, content);
        msg.tool_calls = tool_calls;
        msg
    }
}

/// Normalized model-issued tool call. `arguments` is the raw JSON string as
/// the provider sent it; parsing happens at the orchestration boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Tool-choice policy forwarded to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ToolChoice {
    Auto,
    Function(String),
}

impl Default for ToolChoice {
    fn default() -> Self {
        ToolChoice::Auto
    }
}

impl From<String> for ToolChoice {
    fn from(value: String) -> Self {
        if value == "auto" {
            ToolChoice::Auto
        } else {
            ToolChoice::Function(value)
        }
    }
}

/// Per-call options consumed by the provider adapters.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub model: String,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    pub tools: Vec<Value>,
    pub tool_choice: Option<ToolChoice>,
    /// Continuation handle, chained protocol variant only.
    pub previous_response_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    pub model: String,
    pub finish_reason: Option<String>,
    /// Continuation handle returned by the chained protocol variant.
    pub response_id: Option<String>,
    pub usage: Option<Value>,
    pub latency_ms: Option<u128>,
}

/// Caller-facing streaming event: incremental text fragments followed by a
/// terminal done marker. Serializes to `{"delta": "..."}` / `{"done": true}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Delta { delta: String },
    Done { done: bool },
}

impl StreamEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        StreamEvent::Delta { delta: text.into() }
    }

    pub fn done() -> Self {
        StreamEvent::Done { done: true }
    }

    /// Line-oriented SSE framing used by the streaming transport.
    pub fn to_sse(&self) -> String {
        let payload = serde_json::to_string(self).unwrap_or_default();
        format!("data: {}\n\n", payload)
    }
}
