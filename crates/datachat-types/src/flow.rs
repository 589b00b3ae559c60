use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Summary,
    Tool,
}

impl RouteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::Summary => "summary",
            RouteKind::Tool => "tool",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Active,
    Completed,
    Error,
}

/// What a step stands for inside its route. Route logic addresses steps by
/// role, never by title.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    Intake,
    Retrieve,
    Analyze,
    Summarize,
    Intent,
    ToolExecution,
    LoopDecision,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowStep {
    pub title: String,
    pub description: String,
    pub status: StepStatus,
    pub role: StepRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Tool names of loop iterations already consumed (loop decision step only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_history: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_loop: Vec<FlowStep>,
}

impl FlowStep {
    pub fn new(role: StepRole, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            status: StepStatus::Pending,
            role,
            tool_name: None,
            tool_history: Vec::new(),
            next_loop: Vec::new(),
        }
    }

    pub fn is_started(&self) -> bool {
        !matches!(self.status, StepStatus::Pending)
    }
}

/// Read-only copy of both routes handed to renderers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlowView {
    pub selected: Option<RouteKind>,
    pub summary: Vec<FlowStep>,
    pub tool: Vec<FlowStep>,
}

impl FlowView {
    pub fn route(&self, kind: RouteKind) -> &[FlowStep] {
        match kind {
            RouteKind::Summary => &self.summary,
            RouteKind::Tool => &self.tool,
        }
    }
}
