//! Decoded stream events.

use crate::ActivityKind;
use serde_json::{Map, Value};

/// One classified unit of protocol meaning. Consumed by a single reduction step.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Narrative text delta (may contain partial inline tags)
    Text(String),
    /// Structured automation definition
    Workflow(Map<String, Value>),
    ToolStart { tool: ActivityKind },
    /// Tool arguments for the current activity
    ToolInput(Value),
    ToolResult { tool: ActivityKind, result: Value },
    /// Server-reported failure; terminates the stream
    Error(String),
}

impl StreamEvent {
    /// Returns true if no further events are applied after this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Workflow(_) => "workflow",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolInput(_) => "tool_input",
            Self::ToolResult { .. } => "tool_result",
            Self::Error(_) => "error",
        }
    }
}
