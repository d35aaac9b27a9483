// Static model capability table
// Classifies a model id into a protocol variant and feature set without a
// network call. Exact match first, then family prefix, then a default.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The two request/response wire shapes a provider may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVariant {
    /// Full message list re-sent on every call; tool results are plain
    /// `role: tool` entries.
    ChatCompletions,
    /// First call sends full history and receives a continuation handle;
    /// subsequent calls send only new tool results plus the handle.
    Responses,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCapability {
    pub supports_temperature: bool,
    pub supports_vision: bool,
    pub supports_tools: bool,
    pub max_output_tokens: Option<u32>,
    pub protocol: ProtocolVariant,
}

impl Default for ModelCapability {
    fn default() -> Self {
        ModelCapability {
            supports_temperature: true,
            supports_vision: false,
            supports_tools: false,
            max_output_tokens: None,
            protocol: ProtocolVariant::ChatCompletions,
        }
    }
}

/// Read-only after construction; safe for unlimited concurrent readers.
pub struct ModelRegistry {
    exact: HashMap<&'static str, ModelCapability>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        let mut exact = HashMap::new();

        // GPT-5 family (Responses API)
        exact.insert(
            "gpt-5-nano",
            ModelCapability {
                supports_temperature: true,
                supports_vision: false,
                supports_tools: true,
                max_output_tokens: None,
                protocol: ProtocolVariant::Responses,
            },
        );
        exact.insert(
            "gpt-5-mini",
            ModelCapability {
                supports_temperature: true,
                supports_vision: false,
                supports_tools: true,
                max_output_tokens: None,
                protocol: ProtocolVariant::Responses,
            },
        );
        exact.insert(
            "gpt-5.1",
            ModelCapability {
                supports_temperature: true,
                supports_vision: true,
                supports_tools: true,
                max_output_tokens: None,
                protocol: ProtocolVariant::Responses,
            },
        );

        ModelRegistry { exact }
    }

    /// Exact match, then family prefix, then the hard-coded default.
    pub fn get(&self, model_id: &str) -> ModelCapability {
        if model_id.is_empty() {
            return ModelCapability::default();
        }

        if let Some(caps) = self.exact.get(model_id) {
            return caps.clone();
        }

        if model_id.starts_with("gpt-5") {
            return self
                .exact
                .get("gpt-5-nano")
                .cloned()
                .unwrap_or_default();
        }

        if model_id.starts_with("o1") {
            return ModelCapability {
                supports_temperature: false,
                supports_tools: false,
                ..ModelCapability::default()
            };
        }

        ModelCapability::default()
    }
}
