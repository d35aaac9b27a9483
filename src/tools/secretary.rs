// Mailbox and calendar tool dispatch

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{error, info};

use super::ToolExecutor;

/// Backend for the mailbox/calendar tool surface. Implementations talk to
/// the actual account providers; each method returns a plain-text summary
/// the model can read.
#[async_trait::async_trait]
pub trait MailCalendar: Send + Sync {
    async fn list_emails(&self, account: &str, filters: &Value) -> Result<String>;
    async fn list_events(&self, account: &str, start_time: &str, end_time: &str) -> Result<String>;
    async fn find_free_slots(
        &self,
        account: &str,
        start_time: &str,
        end_time: &str,
        duration_minutes: i64,
    ) -> Result<String>;
    async fn create_event(
        &self,
        account: &str,
        summary: &str,
        start_time: &str,
        end_time: &str,
        attendees: &[String],
    ) -> Result<String>;
    async fn reply_email(
        &self,
        account: &str,
        message_id: &str,
        body: &str,
        reply_all: bool,
    ) -> Result<String>;
    async fn forward_email(
        &self,
        account: &str,
        message_id: &str,
        to: &[String],
        body: &str,
    ) -> Result<String>;
    async fn delete_emails(
        &self,
        account: &str,
        message_ids: &[String],
        hard_delete: bool,
    ) -> Result<String>;
    async fn get_event(&self, account: &str, event_id: &str) -> Result<String>;
    async fn update_event(&self, account: &str, event_id: &str, changes: &Value) -> Result<String>;
    async fn delete_event(&self, account: &str, event_id: &str) -> Result<String>;
    async fn respond_to_invitation(
        &self,
        account: &str,
        event_id: &str,
        response: &str,
    ) -> Result<String>;
    async fn mark_email_as_read(&self, account: &str, message_id: &str) -> Result<String>;
    async fn mark_email_as_unread(&self, account: &str, message_id: &str) -> Result<String>;
    async fn star_email(&self, account: &str, message_id: &str) -> Result<String>;
    async fn unstar_email(&self, account: &str, message_id: &str) -> Result<String>;
    async fn send_email(
        &self,
        account: &str,
        to: &[String],
        subject: &str,
        body: &str,
    ) -> Result<String>;
    async fn get_email(&self, account: &str, message_id: &str) -> Result<String>;
    async fn get_next_event(&self, account: &str) -> Result<String>;
}

/// Dispatches model-issued tool calls onto a `MailCalendar` backend.
/// Backend failures and unknown tool names become "Error ..." strings so
/// the agent loop keeps going and the model sees what went wrong.
pub struct MailCalendarExecutor {
    backend: Arc<dyn MailCalendar>,
}

impl MailCalendarExecutor {
    pub fn new(backend: Arc<dyn MailCalendar>) -> Self {
        MailCalendarExecutor { backend }
    }

    async fn dispatch(&self, name: &str, args: &Value) -> Result<String> {
        let account = str_arg(args, "account_label", "work");
        let backend = &self.backend;

        match name {
            "list_emails" => {
                let default_filters = Value::Object(serde_json::Map::new());
                let filters = args.get("filters").unwrap_or(&default_filters);
                backend.list_emails(&account, filters).await
            }
            "list_events" => {
                backend
                    .list_events(
                        &account,
                        &str_arg(args, "start_time", ""),
                        &str_arg(args, "end_time", ""),
                    )
                    .await
            }
            "find_free_slots" => {
                backend
                    .find_free_slots(
                        &account,
                        &str_arg(args, "start_time", ""),
                        &str_arg(args, "end_time", ""),
                        args["duration_minutes"].as_i64().unwrap_or(0),
                    )
                    .await
            }
            "create_event" => {
                backend
                    .create_event(
                        &account,
                        &str_arg(args, "summary", "Untitled"),
                        &str_arg(args, "start_time", ""),
                        &str_arg(args, "end_time", ""),
                        &list_arg(args, "attendees"),
                    )
                    .await
            }
            "reply_email" => {
                backend
                    .reply_email(
                        &account,
                        &str_arg(args, "message_id", ""),
                        &str_arg(args, "body", ""),
                        args["reply_all"].as_bool().unwrap_or(false),
                    )
                    .await
            }
            "forward_email" => {
                backend
                    .forward_email(
                        &account,
                        &str_arg(args, "message_id", ""),
                        &list_arg(args, "to"),
                        &str_arg(args, "body", ""),
                    )
                    .await
            }
            "delete_emails" => {
                backend
                    .delete_emails(
                        &account,
                        &list_arg(args, "message_ids"),
                        args["hard_delete"].as_bool().unwrap_or(false),
                    )
                    .await
            }
            "get_event" => backend.get_event(&account, &str_arg(args, "event_id", "")).await,
            "update_event" => {
                let event_id = str_arg(args, "event_id", "");
                let changes: serde_json::Map<String, Value> = args
                    .as_object()
                    .map(|obj| {
                        obj.iter()
                            .filter(|(k, _)| k.as_str() != "account_label" && k.as_str() != "event_id")
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                backend
                    .update_event(&account, &event_id, &Value::Object(changes))
                    .await
            }
            "delete_event" => {
                backend
                    .delete_event(&account, &str_arg(args, "event_id", ""))
                    .await
            }
            "respond_to_invitation" => {
                backend
                    .respond_to_invitation(
                        &account,
                        &str_arg(args, "event_id", ""),
                        &str_arg(args, "response", ""),
                    )
                    .await
            }
            "mark_email_as_read" => {
                backend
                    .mark_email_as_read(&account, &str_arg(args, "message_id", ""))
                    .await
            }
            "mark_email_as_unread" => {
                backend
                    .mark_email_as_unread(&account, &str_arg(args, "message_id", ""))
                    .await
            }
            "star_email" => {
                backend
                    .star_email(&account, &str_arg(args, "message_id", ""))
                    .await
            }
            "unstar_email" => {
                backend
                    .unstar_email(&account, &str_arg(args, "message_id", ""))
                    .await
            }
            "send_email" => {
                backend
                    .send_email(
                        &account,
                        &list_arg(args, "to"),
                        &str_arg(args, "subject", ""),
                        &str_arg(args, "body", ""),
                    )
                    .await
            }
            "get_email" => {
                backend
                    .get_email(&account, &str_arg(args, "message_id", ""))
                    .await
            }
            "get_next_event" => backend.get_next_event(&account).await,
            _ => Ok(format!("Error: Unknown tool {}", name)),
        }
    }
}

#[async_trait::async_trait]
impl ToolExecutor for MailCalendarExecutor {
    async fn execute(&self, name: &str, args: &Value) -> String {
        if name.is_empty() {
            return "Error: tool name is missing.".to_string();
        }

        info!(tool = name, "executing tool");
        match self.dispatch(name, args).await {
            Ok(result) => result,
            Err(e) => {
                error!(tool = name, error = %e, "tool execution failed");
                format!("Error executing {}: {}", name, e)
            }
        }
    }
}

fn str_arg(args: &Value, key: &str, default: &str) -> String {
    args.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}

fn list_arg(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
