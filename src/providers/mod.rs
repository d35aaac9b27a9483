// Provider adapters module

pub mod adapter_trait;
pub mod chat_completions;
pub mod responses;
pub mod wire;

pub use adapter_trait::{DeltaStream, ProviderAdapter};
pub use chat_completions::ChatCompletionsAdapter;
pub use responses::ResponsesAdapter;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::capabilities::{ModelRegistry, ProtocolVariant};
use crate::config::ProviderConfig;

/// Owns one adapter per protocol variant, constructed once at startup and
/// dispatched by the capability descriptor's variant tag.
pub struct ProviderFactory {
    chat_completions: Arc<dyn ProviderAdapter>,
    responses: Arc<dyn ProviderAdapter>,
}

impl ProviderFactory {
    pub fn new(config: ProviderConfig, registry: Arc<ModelRegistry>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(ProviderFactory {
            chat_completions: Arc::new(ChatCompletionsAdapter::new(
                client.clone(),
                config.clone(),
                registry.clone(),
            )),
            responses: Arc::new(ResponsesAdapter::new(client, config, registry)),
        })
    }

    /// Injection seam for tests and non-HTTP backends.
    pub fn from_adapters(
        chat_completions: Arc<dyn ProviderAdapter>,
        responses: Arc<dyn ProviderAdapter>,
    ) -> Self {
        ProviderFactory {
            chat_completions,
            responses,
        }
    }

    pub fn adapter_for(&self, variant: ProtocolVariant) -> Arc<dyn ProviderAdapter> {
        match variant {
            ProtocolVariant::ChatCompletions => self.chat_completions.clone(),
            ProtocolVariant::Responses => self.responses.clone(),
        }
    }
}

/// Some models reject the temperature parameter outright; that rejection is
/// retried exactly once with temperature omitted, any other error is fatal
/// for the call.
pub(crate) fn is_temperature_rejection(status: reqwest::StatusCode, body: &str) -> bool {
    status.as_u16() == 400 && body.contains("temperature")
}
