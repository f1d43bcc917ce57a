//! Maps decoded frame bodies onto `StreamEvent` variants.

use chatstream_types::{ActivityKind, StreamEvent};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Shape shared by every frame body.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Value,
}

/// Content of `tool_start` and `tool_result` frames.
#[derive(Debug, Deserialize)]
struct ToolContent {
    tool: ActivityKind,
    #[serde(default)]
    result: Value,
}

/// Classify a frame body. Unknown or ill-shaped frames are dropped with a
/// diagnostic and yield `None`.
pub fn classify(value: Value) -> Option<StreamEvent> {
    let frame: RawFrame = match serde_json::from_value(value) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(target: "chatstream::classifier", "Frame without a type field: {}", e);
            return None;
        }
    };

    let event = match frame.kind.as_str() {
        "text" => match frame.content {
            Value::String(text) => StreamEvent::Text(text),
            other => return drop_frame("text", &other),
        },
        "workflow" => match frame.content {
            Value::Object(payload) => StreamEvent::Workflow(payload),
            other => return drop_frame("workflow", &other),
        },
        "tool_start" => {
            let tool = tool_content("tool_start", frame.content)?;
            StreamEvent::ToolStart { tool: tool.tool }
        }
        "tool_input" => StreamEvent::ToolInput(frame.content),
        "tool_result" => {
            let tool = tool_content("tool_result", frame.content)?;
            StreamEvent::ToolResult {
                tool: tool.tool,
                result: tool.result,
            }
        }
        "error" => StreamEvent::Error(error_message(frame.content)),
        other => {
            debug!(target: "chatstream::classifier", "Dropping frame with unknown type: {}", other);
            return None;
        }
    };

    Some(event)
}

fn tool_content(kind: &str, content: Value) -> Option<ToolContent> {
    match serde_json::from_value::<ToolContent>(content.clone()) {
        Ok(tool) => Some(tool),
        Err(e) => {
            warn!(target: "chatstream::classifier", "Dropping {} frame: {}: {}", kind, e, content);
            None
        }
    }
}

fn drop_frame(kind: &str, content: &Value) -> Option<StreamEvent> {
    warn!(target: "chatstream::classifier", "Dropping {} frame with unexpected content: {}", kind, content);
    None
}

/// Servers send either a bare string or an object carrying `message`.
fn error_message(content: Value) -> String {
    match content {
        Value::String(message) => message,
        Value::Object(ref map) => match map.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => content.to_string(),
        },
        Value::Null => "Unknown error".to_string(),
        other => other.to_string(),
    }
}
