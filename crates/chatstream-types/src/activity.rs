//! Tool activity records shown on a message's timeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of tool the assistant invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    WebSearch,
    CodeExecution,
}

impl ActivityKind {
    /// Human title used when the activity starts.
    pub fn title(&self) -> &'static str {
        match self {
            ActivityKind::WebSearch => "Searching the web",
            ActivityKind::CodeExecution => "Executing code",
        }
    }

    /// Wire name of the tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::WebSearch => "web_search",
            ActivityKind::CodeExecution => "code_execution",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Running,
    Completed,
    Error,
}

/// A discrete tool operation reported by the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub kind: ActivityKind,
    pub status: ActivityStatus,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration, set once when the activity leaves `Running`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Activity {
    /// Create a running activity.
    pub fn start(kind: ActivityKind, started_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("activity-{}", Uuid::new_v4()),
            kind,
            status: ActivityStatus::Running,
            title: kind.title().to_string(),
            description: None,
            details: None,
            started_at,
            duration_ms: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ActivityStatus::Running
    }

    /// Move out of `Running`. Returns false (and changes nothing) if the
    /// activity already finished.
    pub fn finish(&mut self, status: ActivityStatus, details: Value, at: DateTime<Utc>) -> bool {
        if !self.is_running() || status == ActivityStatus::Running {
            return false;
        }
        let elapsed = (at - self.started_at).num_milliseconds().max(0);
        self.status = status;
        self.details = Some(details);
        self.duration_ms = Some(elapsed as u64);
        true
    }
}
