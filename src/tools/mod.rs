// Tool execution surface

pub mod definitions;
pub mod secretary;

pub use definitions::secretary_tools;
pub use secretary::{MailCalendar, MailCalendarExecutor};

use serde_json::Value;

/// Executes a named tool against already-unmasked arguments and returns a
/// plain-text result. Failures are reported inside the returned string
/// ("Error: ..." / "Error executing ...") so the model can react to them.
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, args: &Value) -> String;
}

/// Arguments arrive as a JSON string from the model; malformed JSON degrades
/// to an empty object so the tool still runs with defaults.
pub fn parse_arguments(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if value.is_object() => value,
        _ => Value::Object(serde_json::Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_arguments_parse() {
        let args = parse_arguments(r#"{"message_id": "m1"}"#);
        assert_eq!(args["message_id"], "m1");
    }

    #[test]
    fn malformed_arguments_degrade_to_empty_object() {
        assert_eq!(parse_arguments("not json"), serde_json::json!({}));
        assert_eq!(parse_arguments("[1, 2]"), serde_json::json!({}));
        assert_eq!(parse_arguments(""), serde_json::json!({}));
    }
}
