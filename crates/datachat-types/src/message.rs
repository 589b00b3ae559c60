use chrono::{DateTime, Utc};
use datachat_core::id::{self, Prefix};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One ordered unit of an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ToolCall { call_id: String },
}

impl ContentPart {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            ContentPart::ToolCall { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Running,
    Success,
    Error,
}

impl ToolCallStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ToolCallStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolCallStatus::Running => "running",
            ToolCallStatus::Success => "success",
            ToolCallStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    pub name: String,
    pub args: serde_json::Value,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallRecord {
    pub fn running(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            args,
            status: ToolCallStatus::Running,
            result: None,
            artifact: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl UserMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: id::create(Prefix::Message, None),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// The assistant reply of one turn, rebuilt incrementally from the event
/// stream. `content` never holds two adjacent text parts and every tool-call
/// marker has a matching entry in `tool_calls`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub id: String,
    pub content: Vec<ContentPart>,
    pub tool_calls: HashMap<String, ToolCallRecord>,
    pub loading: bool,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Terminal error that was appended to the visible text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AssistantMessage {
    pub fn placeholder() -> Self {
        Self {
            id: id::create(Prefix::Message, None),
            content: Vec::new(),
            tool_calls: HashMap::new(),
            loading: true,
            suggestions: Vec::new(),
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn get_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| p.as_text())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool calls in the order their markers appear in `content`.
    pub fn ordered_tool_calls(&self) -> Vec<(&str, &ToolCallRecord)> {
        self.content
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolCall { call_id } => self
                    .tool_calls
                    .get(call_id)
                    .map(|record| (call_id.as_str(), record)),
                ContentPart::Text { .. } => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    User(UserMessage),
    Assistant(AssistantMessage),
}

impl ChatMessage {
    pub fn id(&self) -> &str {
        match self {
            ChatMessage::User(m) => &m.id,
            ChatMessage::Assistant(m) => &m.id,
        }
    }

    pub fn role(&self) -> MessageRole {
        match self {
            ChatMessage::User(_) => MessageRole::User,
            ChatMessage::Assistant(_) => MessageRole::Assistant,
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            ChatMessage::Assistant(m) => Some(m),
            ChatMessage::User(_) => None,
        }
    }

    pub fn as_assistant_mut(&mut self) -> Option<&mut AssistantMessage> {
        match self {
            ChatMessage::Assistant(m) => Some(m),
            ChatMessage::User(_) => None,
        }
    }
}
