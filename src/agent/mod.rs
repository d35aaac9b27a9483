// Multi-turn tool-calling agent loop

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::channel::mpsc;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capabilities::{ModelRegistry, ProtocolVariant};
use crate::config::AgentConfig;
use crate::pii::{PiiTokenizer, TokenMap};
use crate::providers::ProviderFactory;
use crate::tools::{parse_arguments, secretary_tools, ToolExecutor};
use crate::types::{GenerateOptions, Message, MessageContent, StreamEvent};

/// Returned when the turn budget runs out before the model finishes.
pub const MAX_TURNS_MESSAGE: &str =
    "I reached the maximum number of steps and couldn't finish the task.";
/// Returned when the model finishes with no tool calls and no text.
pub const EMPTY_REPLY: &str = "I'm done.";

/// Drives the mask / generate / execute / re-mask cycle. Raw PII never
/// crosses the provider boundary; the per-run `TokenMap` is the only place
/// originals live, and only this loop writes to it.
pub struct AgentOrchestrator {
    factory: ProviderFactory,
    registry: Arc<ModelRegistry>,
    pii: Arc<PiiTokenizer>,
    executor: Arc<dyn ToolExecutor>,
    tools: Vec<Value>,
    config: AgentConfig,
}

impl AgentOrchestrator {
    pub fn new(
        factory: ProviderFactory,
        registry: Arc<ModelRegistry>,
        executor: Arc<dyn ToolExecutor>,
        config: AgentConfig,
    ) -> Self {
        AgentOrchestrator {
            factory,
            registry,
            pii: Arc::new(PiiTokenizer::new()),
            executor,
            tools: secretary_tools(),
            config,
        }
    }

    /// Override the detection rule set. Rule order is precedence.
    pub fn with_tokenizer(mut self, pii: Arc<PiiTokenizer>) -> Self {
        self.pii = pii;
        self
    }

    /// Override the tool schemas offered to the model.
    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tools = tools;
        self
    }

    /// Run the agent to completion and return the final, unmasked answer.
    pub async fn run(&self, query: &str, history: &[Message]) -> Result<String> {
        let run_id = Uuid::new_v4();
        let mut mapping = TokenMap::new();

        let mut messages = self.build_context(query, history, &mut mapping);
        info!(%run_id, model = %self.config.model, masked_values = mapping.len(), "agent run started");

        let caps = self.registry.get(&self.config.model);
        let adapter = self.factory.adapter_for(caps.protocol);
        let mut options = self.build_options(caps.supports_tools);

        for turn in 0..self.config.max_turns {
            let response = adapter.generate(&messages, &options).await?;

            // The chained variant returns a fresh handle each call; keep the
            // last known one if a response arrives without it.
            if caps.protocol == ProtocolVariant::Responses {
                if let Some(id) = &response.meta.response_id {
                    options.previous_response_id = Some(id.clone());
                }
            }

            if response.tool_calls.is_empty() {
                info!(%run_id, turn, "agent run finished");
                if response.content.is_empty() {
                    return Ok(EMPTY_REPLY.to_string());
                }
                return Ok(self.pii.unmask(&response.content, &mapping));
            }

            debug!(%run_id, turn, tool_calls = response.tool_calls.len(), "executing tool calls");

            // Arguments are unmasked against the current mapping before the
            // fan-out; the mapping itself is not touched until every tool
            // has returned.
            let prepared: Vec<(String, String, Value)> = response
                .tool_calls
                .iter()
                .map(|call| {
                    let args = self.pii.unmask_json(&parse_arguments(&call.arguments), &mapping);
                    (call.id.clone(), call.name.clone(), args)
                })
                .collect();

            let executions = prepared.iter().map(|(call_id, name, args)| {
                let executor = self.executor.clone();
                async move { (call_id.clone(), executor.execute(name, args).await) }
            });
            let results = futures::future::join_all(executions).await;

            let mut tool_messages = Vec::with_capacity(results.len());
            for (call_id, output) in results {
                let masked = self.pii.mask(&output, &mut mapping);
                let content = match caps.protocol {
                    // The chained variant expects a JSON envelope per output.
                    ProtocolVariant::Responses => json!({"result": masked}).to_string(),
                    ProtocolVariant::ChatCompletions => masked,
                };
                tool_messages.push(Message::tool(call_id, content));
            }

            match caps.protocol {
                ProtocolVariant::ChatCompletions => {
                    messages.push(Message::assistant_tool_calls(
                        response.content,
                        response.tool_calls,
                    ));
                    messages.extend(tool_messages);
                }
                // Prior context is held server-side through the handle, so
                // the next call carries only the new tool outputs.
                ProtocolVariant::Responses => {
                    messages = tool_messages;
                }
            }
        }

        warn!(%run_id, max_turns = self.config.max_turns, "turn budget exhausted");
        Ok(self.pii.unmask(MAX_TURNS_MESSAGE, &mapping))
    }

    /// Stream a direct answer, unmasking each delta as it arrives. Tool
    /// dispatch is not part of the streaming path. Dropping the receiver
    /// cancels the in-flight generation.
    pub async fn run_stream(
        &self,
        query: &str,
        history: &[Message],
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>> {
        let run_id = Uuid::new_v4();
        let mut mapping = TokenMap::new();

        let messages = self.build_context(query, history, &mut mapping);
        info!(%run_id, model = %self.config.model, "streaming run started");

        let caps = self.registry.get(&self.config.model);
        let adapter = self.factory.adapter_for(caps.protocol);
        let options = self.build_options(false);

        let mut deltas = adapter.stream_generate(&messages, &options).await?;

        let pii = self.pii.clone();
        let (tx, rx) = mpsc::unbounded();
        tokio::spawn(async move {
            while let Some(item) = deltas.next().await {
                match item {
                    Ok(delta) => {
                        let unmasked = pii.unmask(&delta, &mapping);
                        if tx.unbounded_send(StreamEvent::delta(unmasked)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(%run_id, error = %e, "stream interrupted");
                        break;
                    }
                }
            }
            let _ = tx.unbounded_send(StreamEvent::done());
        });

        Ok(rx)
    }

    /// Mask the trailing history window and the query into one shared
    /// mapping, so a value repeated anywhere in the run keeps one token.
    fn build_context(
        &self,
        query: &str,
        history: &[Message],
        mapping: &mut TokenMap,
    ) -> Vec<Message> {
        let mut messages = vec![Message::system(self.system_prompt())];

        let window_start = history.len().saturating_sub(self.config.history_window);
        for msg in &history[window_start..] {
            messages.push(self.mask_message(msg, mapping));
        }

        messages.push(Message::user(self.pii.mask(query, mapping)));
        messages
    }

    fn mask_message(&self, msg: &Message, mapping: &mut TokenMap) -> Message {
        let mut masked = msg.clone();
        masked.content = match &msg.content {
            MessageContent::Text(text) => MessageContent::Text(self.pii.mask(text, mapping)),
            MessageContent::Parts(parts) => MessageContent::Parts(
                parts
                    .iter()
                    .map(|part| match part {
                        crate::types::ContentPart::Text { text } => {
                            crate::types::ContentPart::Text {
                                text: self.pii.mask(text, mapping),
                            }
                        }
                        image => image.clone(),
                    })
                    .collect(),
            ),
        };
        masked
    }

    fn build_options(&self, with_tools: bool) -> GenerateOptions {
        GenerateOptions {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_output_tokens: self.config.max_output_tokens,
            tools: if with_tools {
                self.tools.clone()
            } else {
                Vec::new()
            },
            tool_choice: if with_tools {
                Some(self.config.tool_choice.clone())
            } else {
                None
            },
            previous_response_id: None,
        }
    }

    fn system_prompt(&self) -> String {
        let current_time = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        format!(
            r#"You are a helpful mail and calendar secretary agent.
Current time (UTC): {current_time}

You have access to tools to read emails and calendars, find slots, and create/update/delete events.
Use tools directly without asking for extra confirmation unless the user is ambiguous.

If the user asks for "today", "tomorrow", etc., calculate the ISO dates based on Current time (UTC).
Be concise: respond in 1-3 short sentences summarizing the tool results.

IMPORTANT:
- Keep max_results low (5-10) unless the user specifically asks for more.
- Don't repeat the same tool call multiple times.
- Prefer list_events with specific date ranges.
"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::ModelRegistry;
    use crate::config::ProviderConfig;
    use crate::providers::{DeltaStream, ProviderAdapter};
    use crate::types::{ProviderResponse, ResponseMeta, Role, ToolCall};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted adapter: pops one response per generate call and records
    /// everything it was asked.
    #[derive(Default)]
    struct ScriptedAdapter {
        responses: Mutex<VecDeque<ProviderResponse>>,
        calls: Mutex<Vec<(Vec<Message>, GenerateOptions)>>,
        stream_deltas: Vec<String>,
    }

    impl ScriptedAdapter {
        fn scripted(responses: Vec<ProviderResponse>) -> Arc<Self> {
            Arc::new(ScriptedAdapter {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn call(&self, index: usize) -> (Vec<Message>, GenerateOptions) {
            self.calls.lock().unwrap()[index].clone()
        }
    }

    #[async_trait::async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        async fn generate(
            &self,
            messages: &[Message],
            options: &GenerateOptions,
        ) -> Result<ProviderResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((messages.to_vec(), options.clone()));
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }

        async fn stream_generate(
            &self,
            messages: &[Message],
            options: &GenerateOptions,
        ) -> Result<DeltaStream> {
            self.calls
                .lock()
                .unwrap()
                .push((messages.to_vec(), options.clone()));
            let deltas: Vec<Result<String>> =
                self.stream_deltas.iter().cloned().map(Ok).collect();
            Ok(Box::pin(futures::stream::iter(deltas)))
        }
    }

    /// Records (name, args) pairs and answers from a script, last answer
    /// repeating.
    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<(String, Value)>>,
        outputs: Vec<String>,
    }

    #[async_trait::async_trait]
    impl ToolExecutor for RecordingExecutor {
        async fn execute(&self, name: &str, args: &Value) -> String {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len().min(self.outputs.len().saturating_sub(1));
            calls.push((name.to_string(), args.clone()));
            self.outputs
                .get(index)
                .cloned()
                .unwrap_or_else(|| "ok".to_string())
        }
    }

    fn text_response(content: &str) -> ProviderResponse {
        ProviderResponse {
            content: content.to_string(),
            ..Default::default()
        }
    }

    fn tool_response(id: &str, name: &str, arguments: &str) -> ProviderResponse {
        ProviderResponse {
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
            meta: ResponseMeta {
                response_id: Some(format!("resp_{}", id)),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn orchestrator(
        chat: Arc<ScriptedAdapter>,
        responses: Arc<ScriptedAdapter>,
        executor: Arc<dyn ToolExecutor>,
        config: AgentConfig,
    ) -> AgentOrchestrator {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        AgentOrchestrator::new(
            ProviderFactory::from_adapters(chat, responses),
            Arc::new(ModelRegistry::new()),
            executor,
            config,
        )
    }

    fn chat_config() -> AgentConfig {
        AgentConfig {
            model: "gpt-4o".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn turn_budget_bounds_the_loop() {
        let chat = ScriptedAdapter::scripted(vec![
            tool_response("c1", "get_next_event", "{}"),
            tool_response("c2", "get_next_event", "{}"),
            tool_response("c3", "get_next_event", "{}"),
        ]);
        let agent = orchestrator(
            chat.clone(),
            ScriptedAdapter::scripted(vec![]),
            Arc::new(RecordingExecutor::default()),
            AgentConfig {
                max_turns: 2,
                ..chat_config()
            },
        );

        let answer = agent.run("what's next", &[]).await.unwrap();
        assert_eq!(answer, MAX_TURNS_MESSAGE);
        assert_eq!(chat.call_count(), 2);
    }

    #[tokio::test]
    async fn empty_final_content_maps_to_fixed_reply() {
        let chat = ScriptedAdapter::scripted(vec![text_response("")]);
        let agent = orchestrator(
            chat,
            ScriptedAdapter::scripted(vec![]),
            Arc::new(RecordingExecutor::default()),
            chat_config(),
        );
        let answer = agent.run("hello", &[]).await.unwrap();
        assert_eq!(answer, EMPTY_REPLY);
    }

    #[tokio::test]
    async fn tool_arguments_unmasked_before_execution() {
        let chat = ScriptedAdapter::scripted(vec![
            tool_response(
                "c1",
                "send_email",
                r#"{"to": ["{{EMAIL_1}}"], "subject": "hi", "body": "see you"}"#,
            ),
            text_response("Sent the email to {{EMAIL_1}}."),
        ]);
        let executor = Arc::new(RecordingExecutor {
            outputs: vec!["Email sent".to_string()],
            ..Default::default()
        });
        let agent = orchestrator(
            chat,
            ScriptedAdapter::scripted(vec![]),
            executor.clone(),
            chat_config(),
        );

        let answer = agent
            .run("email test@example.com saying see you", &[])
            .await
            .unwrap();

        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls[0].0, "send_email");
        assert_eq!(calls[0].1["to"][0], "test@example.com");
        assert_eq!(answer, "Sent the email to test@example.com.");
    }

    #[tokio::test]
    async fn tool_results_masked_before_next_model_call() {
        let chat = ScriptedAdapter::scripted(vec![
            tool_response("c1", "get_email", r#"{"message_id": "m1"}"#),
            text_response("Done."),
        ]);
        let executor = Arc::new(RecordingExecutor {
            outputs: vec!["From: bob@corp.com, subject: budget".to_string()],
            ..Default::default()
        });
        let agent = orchestrator(
            chat.clone(),
            ScriptedAdapter::scripted(vec![]),
            executor,
            chat_config(),
        );
        agent.run("read m1", &[]).await.unwrap();

        let (messages, _) = chat.call(1);
        let tool_msg = messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .expect("tool message present");
        let content = tool_msg.content.to_text();
        assert!(!content.contains("bob@corp.com"), "{}", content);
        assert!(content.contains("{{EMAIL_"), "{}", content);
    }

    /// Output derived from the call itself, so result/call pairing stays
    /// observable whatever order the executions finish in.
    struct EchoingExecutor;

    #[async_trait::async_trait]
    impl ToolExecutor for EchoingExecutor {
        async fn execute(&self, name: &str, args: &Value) -> String {
            format!(
                "{} handled {}",
                name,
                args["message_id"].as_str().unwrap_or("-")
            )
        }
    }

    #[tokio::test]
    async fn parallel_tool_results_keep_their_call_ids() {
        let chat = ScriptedAdapter::scripted(vec![
            ProviderResponse {
                tool_calls: vec![
                    ToolCall {
                        id: "c1".to_string(),
                        name: "get_email".to_string(),
                        arguments: r#"{"message_id": "m1"}"#.to_string(),
                    },
                    ToolCall {
                        id: "c2".to_string(),
                        name: "star_email".to_string(),
                        arguments: r#"{"message_id": "m2"}"#.to_string(),
                    },
                ],
                ..Default::default()
            },
            text_response("Done."),
        ]);
        let agent = orchestrator(
            chat.clone(),
            ScriptedAdapter::scripted(vec![]),
            Arc::new(EchoingExecutor),
            chat_config(),
        );
        agent.run("read m1 and star m2", &[]).await.unwrap();

        let (messages, _) = chat.call(1);
        let content_for = |id: &str| {
            messages
                .iter()
                .find(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some(id))
                .expect("tool message present")
                .content
                .to_text()
        };
        assert_eq!(content_for("c1"), "get_email handled m1");
        assert_eq!(content_for("c2"), "star_email handled m2");
    }

    #[tokio::test]
    async fn flat_variant_replays_full_context_with_echo() {
        let chat = ScriptedAdapter::scripted(vec![
            tool_response("c1", "get_next_event", "{}"),
            text_response("Your next event is at noon."),
        ]);
        let agent = orchestrator(
            chat.clone(),
            ScriptedAdapter::scripted(vec![]),
            Arc::new(RecordingExecutor::default()),
            chat_config(),
        );
        agent.run("what's next", &[]).await.unwrap();

        let (messages, _) = chat.call(1);
        assert_eq!(messages[0].role, Role::System);
        let echo = messages
            .iter()
            .find(|m| m.role == Role::Assistant)
            .expect("assistant echo present");
        assert_eq!(echo.tool_calls[0].name, "get_next_event");
        assert!(messages.iter().any(|m| m.role == Role::Tool));
        assert!(messages.iter().any(|m| m.role == Role::User));
    }

    #[tokio::test]
    async fn chained_variant_sends_only_tool_outputs_with_handle() {
        let responses = ScriptedAdapter::scripted(vec![
            tool_response("c1", "get_next_event", "{}"),
            text_response("Nothing scheduled."),
        ]);
        let agent = orchestrator(
            ScriptedAdapter::scripted(vec![]),
            responses.clone(),
            Arc::new(RecordingExecutor {
                outputs: vec!["No events in the next 7 days".to_string()],
                ..Default::default()
            }),
            AgentConfig {
                model: "gpt-5-mini".to_string(),
                ..Default::default()
            },
        );
        agent.run("what's next", &[]).await.unwrap();

        let (first_messages, first_options) = responses.call(0);
        assert!(first_options.previous_response_id.is_none());
        assert!(first_messages.iter().any(|m| m.role == Role::System));

        let (second_messages, second_options) = responses.call(1);
        assert_eq!(
            second_options.previous_response_id.as_deref(),
            Some("resp_c1")
        );
        assert_eq!(second_messages.len(), 1);
        assert_eq!(second_messages[0].role, Role::Tool);
        let envelope: Value =
            serde_json::from_str(&second_messages[0].content.to_text()).unwrap();
        assert!(envelope["result"].is_string());
    }

    #[tokio::test]
    async fn unknown_model_falls_back_to_flat_variant() {
        let chat = ScriptedAdapter::scripted(vec![text_response("hi")]);
        let responses = ScriptedAdapter::scripted(vec![]);
        let agent = orchestrator(
            chat.clone(),
            responses.clone(),
            Arc::new(RecordingExecutor::default()),
            AgentConfig {
                model: "some-experimental-model".to_string(),
                ..Default::default()
            },
        );
        agent.run("hello", &[]).await.unwrap();
        assert_eq!(chat.call_count(), 1);
        assert_eq!(responses.call_count(), 0);
    }

    #[tokio::test]
    async fn tools_withheld_when_model_lacks_support() {
        // o1-prefixed descriptors disable tool use entirely.
        let chat = ScriptedAdapter::scripted(vec![text_response("ok")]);
        let agent = orchestrator(
            chat.clone(),
            ScriptedAdapter::scripted(vec![]),
            Arc::new(RecordingExecutor::default()),
            AgentConfig {
                model: "o1-mini".to_string(),
                ..Default::default()
            },
        );
        agent.run("hello", &[]).await.unwrap();
        let (_, options) = chat.call(0);
        assert!(options.tools.is_empty());
        assert!(options.tool_choice.is_none());
    }

    #[tokio::test]
    async fn repeated_value_shares_one_token_across_history_and_query() {
        let chat = ScriptedAdapter::scripted(vec![text_response(
            "I emailed {{EMAIL_1}} as requested.",
        )]);
        let agent = orchestrator(
            chat.clone(),
            ScriptedAdapter::scripted(vec![]),
            Arc::new(RecordingExecutor::default()),
            chat_config(),
        );

        let history = vec![Message::user("my address is test@example.com")];
        let answer = agent
            .run("send a note to test@example.com", &history)
            .await
            .unwrap();

        let (messages, _) = chat.call(0);
        let history_text = messages[1].content.to_text();
        let query_text = messages.last().unwrap().content.to_text();
        assert!(history_text.contains("{{EMAIL_1}}"));
        assert!(query_text.contains("{{EMAIL_1}}"));
        assert!(!query_text.contains("{{EMAIL_2}}"));
        assert_eq!(answer, "I emailed test@example.com as requested.");
    }

    #[tokio::test]
    async fn history_window_drops_older_messages() {
        let chat = ScriptedAdapter::scripted(vec![text_response("ok")]);
        let agent = orchestrator(
            chat.clone(),
            ScriptedAdapter::scripted(vec![]),
            Arc::new(RecordingExecutor::default()),
            AgentConfig {
                history_window: 2,
                ..chat_config()
            },
        );

        let history = vec![
            Message::user("oldest"),
            Message::assistant("older"),
            Message::user("recent"),
        ];
        agent.run("now", &history).await.unwrap();

        let (messages, _) = chat.call(0);
        // system + 2 history + query
        assert_eq!(messages.len(), 4);
        assert!(!messages
            .iter()
            .any(|m| m.content.to_text().contains("oldest")));
    }

    #[tokio::test]
    async fn streaming_deltas_unmasked_and_terminated() {
        let chat = Arc::new(ScriptedAdapter {
            stream_deltas: vec![
                "Sure, I'll email ".to_string(),
                "{{EMAIL_1}}".to_string(),
                " right away.".to_string(),
            ],
            ..Default::default()
        });
        let agent = orchestrator(
            chat,
            ScriptedAdapter::scripted(vec![]),
            Arc::new(RecordingExecutor::default()),
            chat_config(),
        );

        let rx = agent
            .run_stream("write to test@example.com", &[])
            .await
            .unwrap();
        let events: Vec<StreamEvent> = rx.collect().await;

        assert_eq!(events.len(), 4);
        assert_eq!(events[1], StreamEvent::delta("test@example.com"));
        assert_eq!(events[3], StreamEvent::done());
    }

    #[test]
    fn system_prompt_carries_utc_timestamp() {
        let agent = orchestrator(
            ScriptedAdapter::scripted(vec![]),
            ScriptedAdapter::scripted(vec![]),
            Arc::new(RecordingExecutor::default()),
            AgentConfig::default(),
        );
        let prompt = agent.system_prompt();
        assert!(prompt.contains("Current time (UTC): 20"));
        assert!(prompt.contains("secretary agent"));
    }
}
