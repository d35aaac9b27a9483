// Agent and provider configuration

use serde::Deserialize;

use crate::types::ToolChoice;

pub const DEFAULT_MODEL: &str = "gpt-5-mini";
pub const DEFAULT_MAX_TURNS: usize = 5;
pub const DEFAULT_HISTORY_WINDOW: usize = 8;

/// Options recognized by the orchestrator and forwarded to the adapters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model id; selects the capability descriptor and protocol variant.
    pub model: String,
    /// Upper bound on model-call cycles within one run.
    pub max_turns: usize,
    /// Client-requested output ceiling, capped by the model descriptor.
    pub max_output_tokens: Option<u32>,
    /// Ignored for models whose descriptor says temperature is unsupported.
    pub temperature: Option<f64>,
    pub tool_choice: ToolChoice,
    /// Number of trailing history messages masked into the context.
    pub history_window: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            model: DEFAULT_MODEL.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            max_output_tokens: None,
            temperature: None,
            tool_choice: ToolChoice::Auto,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

/// Connection settings for the provider endpoint. Credential acquisition is
/// an external concern; the key arrives here already resolved.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            // 2 minutes for LLM responses, 15 second connection timeout
            request_timeout_secs: 120,
            connect_timeout_secs: 15,
        }
    }
}
