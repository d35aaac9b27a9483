// Provider adapter trait

use std::pin::Pin;

use anyhow::Result;
use futures::Stream;

use crate::types::{GenerateOptions, Message, ProviderResponse};

/// Incremental text deltas, one logical shape for both protocol variants.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<ProviderResponse>;

    async fn stream_generate(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<DeltaStream>;
}
