use crate::error::EventParseError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StreamEvent {
    /// Incremental assistant text (`token`, `text` or `chunk`).
    Token { content: String },
    ToolCall {
        id: String,
        name: String,
        args: Value,
    },
    ToolResult {
        id: String,
        result: Value,
        artifact: Option<Value>,
    },
    /// Tool failure. Its `error` field is the payload, not a protocol error.
    ToolError { id: String, error: String },
    Done,
    /// Protocol-level error. Terminal.
    Error { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Token { .. } => "token",
            StreamEvent::ToolCall { .. } => "tool_call",
            StreamEvent::ToolResult { .. } => "tool_result",
            StreamEvent::ToolError { .. } => "tool_error",
            StreamEvent::Done => "done",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// Decodes one NDJSON line.
///
/// A top-level `error` field turns any event except `tool_error` into
/// [`StreamEvent::Error`], whatever its `type` says.
pub fn parse_event(line: &str) -> Result<StreamEvent, EventParseError> {
    let value: Value = serde_json::from_str(line)?;
    let Value::Object(obj) = value else {
        return Err(EventParseError::NotAnObject);
    };

    let event_type = obj.get("type").and_then(Value::as_str);

    if event_type != Some("tool_error") {
        if let Some(error) = obj.get("error").filter(|v| !v.is_null()) {
            return Ok(StreamEvent::Error {
                message: error_message(error),
            });
        }
    }

    let Some(event_type) = event_type else {
        return Err(EventParseError::MissingType);
    };

    match event_type {
        "token" | "text" | "chunk" => {
            let content = str_field(&obj, "token", "content")?;
            Ok(StreamEvent::Token { content })
        }
        "tool_call" => Ok(StreamEvent::ToolCall {
            id: str_field(&obj, "tool_call", "id")?,
            name: str_field(&obj, "tool_call", "name")?,
            args: obj.get("args").cloned().unwrap_or(Value::Null),
        }),
        "tool_result" => Ok(StreamEvent::ToolResult {
            id: str_field(&obj, "tool_result", "id")?,
            result: obj.get("result").cloned().unwrap_or(Value::Null),
            artifact: obj.get("artifact").filter(|v| !v.is_null()).cloned(),
        }),
        "tool_error" => Ok(StreamEvent::ToolError {
            id: str_field(&obj, "tool_error", "id")?,
            error: obj
                .get("error")
                .map(error_message)
                .unwrap_or_else(|| "tool failed".to_string()),
        }),
        "done" => Ok(StreamEvent::Done),
        "error" => Ok(StreamEvent::Error {
            message: obj
                .get("message")
                .or_else(|| obj.get("content"))
                .map(error_message)
                .unwrap_or_else(|| "unknown error".to_string()),
        }),
        other => Err(EventParseError::UnknownType(other.to_string())),
    }
}

fn str_field(
    obj: &Map<String, Value>,
    kind: &'static str,
    field: &'static str,
) -> Result<String, EventParseError> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(EventParseError::MissingField { kind, field })
}

fn error_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_aliases_parse_to_token() {
        for kind in ["token", "text", "chunk"] {
            let line = format!(r#"{{"type":"{kind}","content":"hi"}}"#);
            match parse_event(&line).unwrap() {
                StreamEvent::Token { content } => assert_eq!(content, "hi"),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn tool_call_carries_args() {
        let line = r#"{"type":"tool_call","id":"t1","name":"plot_scatter","args":{"x":"age"}}"#;
        match parse_event(line).unwrap() {
            StreamEvent::ToolCall { id, name, args } => {
                assert_eq!(id, "t1");
                assert_eq!(name, "plot_scatter");
                assert_eq!(args, json!({"x": "age"}));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn tool_result_with_optional_artifact() {
        let with = r#"{"type":"tool_result","id":"t1","result":{"rows":3},"artifact":{"kind":"chart"}}"#;
        let without = r#"{"type":"tool_result","id":"t1","result":"ok"}"#;
        match parse_event(with).unwrap() {
            StreamEvent::ToolResult { artifact, .. } => {
                assert_eq!(artifact, Some(json!({"kind": "chart"})))
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match parse_event(without).unwrap() {
            StreamEvent::ToolResult { result, artifact, .. } => {
                assert_eq!(result, json!("ok"));
                assert!(artifact.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn tool_error_field_is_payload_not_protocol_error() {
        let line = r#"{"type":"tool_error","id":"t1","error":"division by zero"}"#;
        assert_eq!(
            parse_event(line).unwrap(),
            StreamEvent::ToolError {
                id: "t1".to_string(),
                error: "division by zero".to_string(),
            }
        );
    }

    #[test]
    fn error_field_on_other_events_is_terminal() {
        let line = r#"{"type":"token","content":"x","error":{"message":"quota exceeded"}}"#;
        let event = parse_event(line).unwrap();
        assert!(event.is_terminal());
        assert_eq!(
            event,
            StreamEvent::Error {
                message: "quota exceeded".to_string()
            }
        );

        let bare = r#"{"error":"boom"}"#;
        assert_eq!(
            parse_event(bare).unwrap(),
            StreamEvent::Error {
                message: "boom".to_string()
            }
        );
    }

    #[test]
    fn malformed_and_unknown_lines_are_errors() {
        assert!(matches!(
            parse_event("{bad json}"),
            Err(EventParseError::Json(_))
        ));
        assert!(matches!(
            parse_event(r#"{"type":"heartbeat"}"#),
            Err(EventParseError::UnknownType(t)) if t == "heartbeat"
        ));
        assert!(matches!(
            parse_event(r#"{"type":"token"}"#),
            Err(EventParseError::MissingField { field: "content", .. })
        ));
        assert!(matches!(parse_event("[1,2]"), Err(EventParseError::NotAnObject)));
    }
}
