// Chained protocol variant: server holds conversation state, each call sends
// only the new items plus a continuation handle

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

pub struct ResponsesAdapter {
    client: Client,
    config: ProviderConfig,
    registry: Arc<ModelRegistry>,
}

impl ResponsesAdapter {
    pub fn new(client: Client, config: ProviderConfig, registry: Arc<ModelRegistry>) -> Self {
        ResponsesAdapter {
            client,
            config,
            registry,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.config.base_url.trim_end_matches('/'))
    }

    /// Split the message list into top-level instructions (the first system
    /// message) and input items. Tool results become `function_call_output`
    /// items keyed by call id; everything else stays a role/content item.
    fn build_input_and_instructions(messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let mut instructions = None;
        let mut input = Vec::with_capacity(messages.len());

        for msg in messages {
            match msg.role {
                Role::System if instructions.is_none() => {
                    instructions = Some(msg.content.to_text());
                }
                Role::Tool => {
                    input.push(json!({
                        "type": "function_call_output",
                        "call_id": msg.tool_call_id.as_deref().unwrap_or_default(),
                        "output": msg.content.to_text(),
                    }));
                }
                _ => {
                    input.push(json!({
                        "role": msg.role.as_str(),
                        "content": Self::build_content(&msg.content),
                    }));
                }
            }
        }

        (instructions, input)
    }

    fn build_content(content: &MessageContent) -> Value {
        match content {
            MessageContent::Text(text) => json!(text),
            MessageContent::Parts(parts) => {
                let converted: Vec<Value> = parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => {
                            json!({"type": "input_text", "text": text})
                        }
                        ContentPart::ImageUrl { url } => {
                            json!({"type": "input_image", "image_url": url})
                        }
                    })
                    .collect();
                Value::Array(converted)
            }
        }
    }

    fn build_body(&self, messages: &[Message], options: &GenerateOptions, stream: bool) -> Value {
        let model = if options.model.is_empty() {
            DEFAULT_MODEL
        } else {
            &options.model
        };
        let caps = self.registry.get(model);

        let (instructions, input) = Self::build_input_and_instructions(messages);

        let mut body = json!({
            "model": model,
            "input": input,
        });

        if let Some(instructions) = instructions {
            body["instructions"] = json!(instructions);
        }

        let mut max_tokens = options.max_output_tokens;
        if let Some(ceiling) = caps.max_output_tokens {
            max_tokens = Some(max_tokens.map_or(ceiling, |requested| requested.min(ceiling)));
        }
        if let Some(max_tokens) = max_tokens {
            body["max_output_tokens"] = json!(max_tokens);
        }

        if caps.supports_temperature {
            if let Some(temperature) = options.temperature {
                body["temperature"] = json!(temperature);
            }
        }

        if !options.tools.is_empty() {
            body["tools"] = Value::Array(wire::convert_tools_for_responses(&options.tools));
            if let Some(tool_choice) = &options.tool_choice {
                body["tool_choice"] = match tool_choice {
                    ToolChoice::Auto => json!("auto"),
                    ToolChoice::Function(name) => json!({"type": "function", "name": name}),
                };
            }
        }

        if let Some(previous) = &options.previous_response_id {
            body["previous_response_id"] = json!(previous);
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
            .context("Failed to send responses request")
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ResponsesAdapter {
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

        let mut content = String::new();
        let mut tool_calls = Vec::new();

        if let Some(output) = payload["output"].as_array() {
            for item in output {
                match item["type"].as_str() {
                    Some("message") => {
                        if let Some(parts) = item["content"].as_array() {
                            for part in parts {
                                if part["type"].as_str() == Some("output_text") {
                                    content.push_str(part["text"].as_str().unwrap_or_default());
                                }
                            }
                        }
                    }
                    Some("function_call") => {
                        let call = wire::parse_tool_call(item)
                            .with_context(|| format!("Unparseable tool call: {}", item))?;
                        tool_calls.push(call);
                    }
                    _ => {}
                }
            }
        }

        debug!(
            model = %body["model"],
            content_len = content.len(),
            tool_calls = tool_calls.len(),
            "chained response received"
        );

        Ok(ProviderResponse {
            content,
            tool_calls,
            meta: ResponseMeta {
                model: body["model"].as_str().unwrap_or_default().to_string(),
                finish_reason: payload
                    .get("status")
                    .and_then(|s| s.as_str())
                    .map(String::from),
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
                    match event["type"].as_str() {
                        Some("response.output_text.delta") => {
                            let delta = event["delta"].as_str().unwrap_or_default();
                            if delta.is_empty() {
                                continue;
                            }
                            if tx.unbounded_send(Ok(delta.to_string())).is_err() {
                                return;
                            }
                        }
                        Some("response.completed") => break 'read,
                        _ => {}
                    }
                }
            }
        });

        Ok(Box::pin(rx))
    }
}
