// Flat protocol variant: full message list re-sent on every call

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use futures::channel::mpsc;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::capabilities::ModelRegistry;
use crate::config::{ProviderConfig, DEFAULT_MODEL};
use crate::providers::adapter_trait::{DeltaStream, ProviderAdapter};
use crate::providers::{is_temperature_rejection, wire};
use crate::types::{
    ContentPart, GenerateOptions, Message, MessageContent, ProviderResponse, ResponseMeta, Role,
    ToolChoice,
};

pub struct ChatCompletionsAdapter {
    client: Client,
    config: ProviderConfig,
    registry: Arc<ModelRegistry>,
}

impl ChatCompletionsAdapter {
    pub fn new(client: Client, config: ProviderConfig, registry: Arc<ModelRegistry>) -> Self {
        ChatCompletionsAdapter {
            client,
            config,
            registry,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_messages(messages: &[Message]) -> Vec<Value> {
        let mut built = Vec::with_capacity(messages.len());
        for msg in messages {
            let mut entry = json!({
                "role": msg.role.as_str(),
                "content": Self::build_content(&msg.content),
            });

            if msg.role == Role::Tool {
                if let Some(call_id) = &msg.tool_call_id {
                    entry["tool_call_id"] = json!(call_id);
                }
                if let Some(name) = &msg.name {
                    entry["name"] = json!(name);
                }
            }

            if !msg.tool_calls.is_empty() {
                let calls: Vec<Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {"name": tc.name, "arguments": tc.arguments},
                        })
                    })
                    .collect();
                entry["tool_calls"] = Value::Array(calls);
            }

            built.push(entry);
        }
        built
    }

    fn build_content(content: &MessageContent) -> Value {
        match content {
            MessageContent::Text(text) => json!(text),
            MessageContent::Parts(parts) => {
                let cleaned: Vec<Value> = parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => json!({"type": "text", "text": text}),
                        ContentPart::ImageUrl { url } => {
                            json!({"type": "image_url", "image_url": {"url": url}})
                        }
                    })
                    .collect();
                Value::Array(cleaned)
            }
        }
    }

    /// Apply the capability descriptor while building the request body:
    /// temperature is dropped silently when unsupported, the requested token
    /// ceiling is capped by the descriptor's ceiling.
    fn build_body(&self, messages: &[Message], options: &GenerateOptions, stream: bool) -> Value {
        let model = if options.model.is_empty() {
            DEFAULT_MODEL
        } else {
            &options.model
        };
        let caps = self.registry.get(model);

        let mut body = json!({
            "model": model,
            "messages": Self::build_messages(messages),
        });

        let mut max_tokens = options.max_output_tokens;
        if let Some(ceiling) = caps.max_output_tokens {
            max_tokens = Some(max_tokens.map_or(ceiling, |requested| requested.min(ceiling)));
        }
        if let Some(max_tokens) = max_tokens {
            body["max_completion_tokens"] = json!(max_tokens);
        }

        if caps.supports_temperature {
            if let Some(temperature) = options.temperature {
                body["temperature"] = json!(temperature);
            }
        }

        if !options.tools.is_empty() {
            body["tools"] = Value::Array(options.tools.clone());
            if let Some(tool_choice) = &options.tool_choice {
                body["tool_choice"] = match tool_choice {
                    ToolChoice::Auto => json!("auto"),
                    ToolChoice::Function(name) => {
                        json!({"type": "function", "function": {"name": name}})
                    }
                };
            }
        }

        if stream {
            body["stream"] = json!(true);
        }

        body
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        self.client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .context("Failed to send completion request")
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ChatCompletionsAdapter {
    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<ProviderResponse> {
        let mut body = self.build_body(messages, options, false);
        let start = Instant::now();

        let mut response = self.post(&body).await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            // Retry once with temperature omitted when the provider rejects
            // the parameter; everything else is fatal for this call.
            if is_temperature_rejection(status, &error_text)
                && body.get("temperature").is_some()
            {
                warn!(model = %body["model"], "provider rejected temperature, retrying without it");
                if let Some(obj) = body.as_object_mut() {
                    obj.remove("temperature");
                }
                response = self.post(&body).await?;
                if !response.status().is_success() {
                    let status = response.status();
                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("Provider error ({}): {}", status, error_text);
                }
            } else {
                anyhow::bail!("Provider error ({}): {}", status, error_text);
            }
        }

        let payload: Value = response.json().await?;
        let choice = payload["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| anyhow::anyhow!("No choices in response"))?;

        let message = &choice["message"];
        let content = message["content"].as_str().unwrap_or_default().to_string();

        let mut tool_calls = Vec::new();
        if let Some(raw_calls) = message["tool_calls"].as_array() {
            for raw in raw_calls {
                let call = wire::parse_tool_call(raw)
                    .with_context(|| format!("Unparseable tool call: {}", raw))?;
                tool_calls.push(call);
            }
        }

        debug!(
            model = %body["model"],
            content_len = content.len(),
            tool_calls = tool_calls.len(),
            "chat completion received"
        );

        Ok(ProviderResponse {
            content,
            tool_calls,
            meta: ResponseMeta {
                model: body["model"].as_str().unwrap_or_default().to_string(),
                finish_reason: choice["finish_reason"].as_str().map(|s| s.to_string()),
                response_id: payload.get("id").and_then(|v| v.as_str()).map(String::from),
                usage: payload.get("usage").cloned(),
                latency_ms: Some(start.elapsed().as_millis()),
            },
        })
    }

    async fn stream_generate(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<DeltaStream> {
        let body = self.build_body(messages, options, true);
        let response = self.post(&body).await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Streaming request failed ({}): {}", status, error_text);
        }

        let (tx, rx) = mpsc::unbounded();
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = wire::LineBuffer::new();

            'read: while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.unbounded_send(Err(
                            anyhow::Error::new(e).context("Failed to read chunk")
                        ));
                        break;
                    }
                };
                buffer.push(&chunk);

                while let Some(line) = buffer.next_line() {
                    let Some(data) = wire::sse_data(&line) else {
                        continue;
                    };
                    if data == "[DONE]" {
                        break 'read;
                    }

                    let Ok(event) = serde_json::from_str::<Value>(data) else {
                        continue;
                    };
                    let delta = event["choices"]
                        .as_array()
                        .and_then(|c| c.first())
                        .and_then(|c| c["delta"]["content"].as_str())
                        .unwrap_or_default();
                    if delta.is_empty() {
                        continue;
                    }
                    if tx.unbounded_send(Ok(delta.to_string())).is_err() {
                        // Caller went away; dropping the response aborts the
                        // in-flight request.
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(rx))
    }
}
