use datachat_types::{AssistantMessage, ContentPart, ToolCallRecord, ToolCallStatus};
use serde_json::Value;

/// Result of resolving or failing a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolUpdate {
    Applied,
    UnknownCall,
    AlreadyResolved(ToolCallStatus),
}

/// Applies stream events to one assistant message while keeping its
/// invariants: no two adjacent text parts, every tool marker backed by a
/// record, and at most one terminal status per tool call.
pub struct MessageAssembler<'a> {
    message: &'a mut AssistantMessage,
}

impl<'a> MessageAssembler<'a> {
    pub fn new(message: &'a mut AssistantMessage) -> Self {
        Self { message }
    }

    pub fn message(&self) -> &AssistantMessage {
        self.message
    }

    /// Appends `delta` and returns the full text of the trailing segment.
    pub fn append_text(&mut self, delta: &str) -> &str {
        if !delta.is_empty() {
            match self.message.content.last_mut() {
                Some(ContentPart::Text { text }) => text.push_str(delta),
                _ => self.message.content.push(ContentPart::Text {
                    text: delta.to_string(),
                }),
            }
        }
        match self.message.content.last() {
            Some(ContentPart::Text { text }) => text,
            _ => "",
        }
    }

    /// Returns `true` when a new marker was appended. A repeated id replaces
    /// the record and keeps the original marker position.
    pub fn register_tool_call(&mut self, id: &str, name: &str, args: Value) -> bool {
        let record = ToolCallRecord::running(name, args);
        let is_new = self
            .message
            .tool_calls
            .insert(id.to_string(), record)
            .is_none();
        if is_new {
            self.message.content.push(ContentPart::ToolCall {
                call_id: id.to_string(),
            });
        } else {
            tracing::warn!(call_id = id, "tool call registered twice");
        }
        is_new
    }

    pub fn resolve_tool_call(
        &mut self,
        id: &str,
        result: Value,
        artifact: Option<Value>,
    ) -> ToolUpdate {
        self.settle(id, |record| {
            record.status = ToolCallStatus::Success;
            record.result = Some(result);
            record.artifact = artifact;
        })
    }

    pub fn fail_tool_call(&mut self, id: &str, error: &str) -> ToolUpdate {
        self.settle(id, |record| {
            record.status = ToolCallStatus::Error;
            record.error = Some(error.to_string());
        })
    }

    /// Appends the visible error suffix and returns the text that was added.
    pub fn append_error(&mut self, message: &str) -> String {
        let suffix = if self.message.get_text().is_empty() {
            format!("[错误] {}", message)
        } else {
            format!("\n\n[错误] {}", message)
        };
        self.append_text(&suffix);
        self.message.error = Some(message.to_string());
        suffix
    }

    pub fn finish(&mut self) {
        self.message.loading = false;
    }

    /// An empty list never clears suggestions that are already shown.
    /// Returns `true` when the visible list changed.
    pub fn set_suggestions(&mut self, suggestions: Vec<String>) -> bool {
        if suggestions.is_empty() || suggestions == self.message.suggestions {
            return false;
        }
        self.message.suggestions = suggestions;
        true
    }

    fn settle<F: FnOnce(&mut ToolCallRecord)>(&mut self, id: &str, apply: F) -> ToolUpdate {
        let Some(record) = self.message.tool_calls.get_mut(id) else {
            tracing::warn!(call_id = id, "tool update for unknown call ignored");
            return ToolUpdate::UnknownCall;
        };
        if record.status.is_terminal() {
            tracing::warn!(
                call_id = id,
                status = record.status.as_str(),
                "tool call already resolved"
            );
            return ToolUpdate::AlreadyResolved(record.status);
        }
        apply(record);
        ToolUpdate::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_adjacent_text(message: &AssistantMessage) -> bool {
        message.content.windows(2).all(|pair| {
            !matches!(
                pair,
                [ContentPart::Text { .. }, ContentPart::Text { .. }]
            )
        })
    }

    #[test]
    fn text_merges_into_trailing_segment() {
        let mut message = AssistantMessage::placeholder();
        let mut asm = MessageAssembler::new(&mut message);
        asm.append_text("Hel");
        assert_eq!(asm.append_text("lo"), "Hello");
        asm.register_tool_call("t1", "plot", json!({}));
        assert_eq!(asm.append_text("after"), "after");
        assert_eq!(asm.append_text(""), "after");

        assert_eq!(message.content.len(), 3);
        assert!(no_adjacent_text(&message));
        assert_eq!(message.get_text(), "Helloafter");
    }

    #[test]
    fn every_op_sequence_keeps_text_merged() {
        const OPS: [Option<&str>; 4] = [Some("ab"), Some("数据"), Some(""), None];
        const MAX_LEN: u32 = 5;

        for len in 0..=MAX_LEN {
            for mut code in 0..OPS.len().pow(len) {
                let mut message = AssistantMessage::placeholder();
                let mut asm = MessageAssembler::new(&mut message);
                let mut expected = String::new();
                let mut segment = String::new();

                for step in 0..len {
                    match OPS[code % OPS.len()] {
                        Some(delta) => {
                            expected.push_str(delta);
                            segment.push_str(delta);
                            assert_eq!(asm.append_text(delta), segment);
                        }
                        None => {
                            asm.register_tool_call(&format!("t{step}"), "plot", json!({}));
                            segment.clear();
                        }
                    }
                    code /= OPS.len();
                }

                assert!(no_adjacent_text(&message));
                assert_eq!(message.get_text(), expected);
                assert!(message
                    .content
                    .iter()
                    .all(|part| !matches!(part, ContentPart::Text { text } if text.is_empty())));
            }
        }
    }

    #[test]
    fn empty_delta_after_tool_adds_nothing() {
        let mut message = AssistantMessage::placeholder();
        let mut asm = MessageAssembler::new(&mut message);
        asm.register_tool_call("t1", "plot", json!({}));
        assert_eq!(asm.append_text(""), "");
        assert_eq!(message.content.len(), 1);
    }

    #[test]
    fn duplicate_tool_call_keeps_single_marker() {
        let mut message = AssistantMessage::placeholder();
        let mut asm = MessageAssembler::new(&mut message);
        assert!(asm.register_tool_call("t1", "plot", json!({"x": 1})));
        assert!(!asm.register_tool_call("t1", "plot_v2", json!({"x": 2})));

        assert_eq!(message.content.len(), 1);
        assert_eq!(message.tool_calls["t1"].name, "plot_v2");
    }

    #[test]
    fn tool_resolves_exactly_once() {
        let mut message = AssistantMessage::placeholder();
        let mut asm = MessageAssembler::new(&mut message);
        asm.register_tool_call("t1", "plot", json!({}));

        assert_eq!(
            asm.resolve_tool_call("t1", json!("ok"), Some(json!({"png": "..."}))),
            ToolUpdate::Applied
        );
        assert_eq!(
            asm.fail_tool_call("t1", "late failure"),
            ToolUpdate::AlreadyResolved(ToolCallStatus::Success)
        );
        assert_eq!(
            asm.resolve_tool_call("missing", json!(null), None),
            ToolUpdate::UnknownCall
        );

        let record = &message.tool_calls["t1"];
        assert_eq!(record.status, ToolCallStatus::Success);
        assert!(record.error.is_none());
        assert!(record.artifact.is_some());
    }

    #[test]
    fn suggestions_are_sticky() {
        let mut message = AssistantMessage::placeholder();
        let mut asm = MessageAssembler::new(&mut message);
        assert!(asm.set_suggestions(vec!["a".to_string()]));
        assert!(!asm.set_suggestions(Vec::new()));
        assert!(!asm.set_suggestions(vec!["a".to_string()]));
        assert_eq!(message.suggestions, vec!["a".to_string()]);
    }

    #[test]
    fn error_suffix_merges_and_is_recorded() {
        let mut message = AssistantMessage::placeholder();
        let mut asm = MessageAssembler::new(&mut message);
        asm.append_text("partial");
        let suffix = asm.append_error("connection reset");
        asm.finish();

        assert_eq!(suffix, "\n\n[错误] connection reset");
        assert_eq!(message.content.len(), 1);
        assert_eq!(message.error.as_deref(), Some("connection reset"));
        assert!(!message.loading);
    }
}
