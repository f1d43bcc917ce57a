//! Tool activity tracking.
//!
//! `ActivityTimeline` correlates start/input/result events of one stream into
//! `Activity` records on the message. `ActivityFeed` keeps the most recent
//! activities across every turn of a session for dashboards.

use chatstream_types::{Activity, ActivityKind, ActivityStatus};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::debug;

/// Default number of activities retained by the session feed.
pub const MAX_FEED_ACTIVITIES: usize = 20;

const MAX_DESCRIPTION_CHARS: usize = 120;

/// Per-stream correlation state.
///
/// Only one activity is current at a time. Starting a new one while another
/// is still running moves the pointer; the earlier activity stays `Running`.
#[derive(Debug, Default, Clone)]
pub struct ActivityTimeline {
    current: Option<String>,
}

impl ActivityTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The current activity within `activities`, if any.
    pub fn current<'a>(&self, activities: &'a [Activity]) -> Option<&'a Activity> {
        let id = self.current.as_deref()?;
        activities.iter().find(|a| a.id == id)
    }

    /// Append a running activity and make it current.
    pub fn start<'a>(
        &mut self,
        activities: &'a mut Vec<Activity>,
        kind: ActivityKind,
        now: DateTime<Utc>,
    ) -> &'a Activity {
        // Keep the list ordered by start time even if the clock steps back
        let started_at = activities
            .last()
            .map_or(now, |last| last.started_at.max(now));

        if let Some(previous) = self.current(activities) {
            if previous.is_running() {
                debug!(
                    target: "chatstream::activity",
                    "Activity {} superseded while still running", previous.id
                );
            }
        }

        let activity = Activity::start(kind, started_at);
        self.current = Some(activity.id.clone());
        activities.push(activity);
        &activities[activities.len() - 1]
    }

    /// Attach tool input to the current activity.
    pub fn record_input<'a>(
        &mut self,
        activities: &'a mut [Activity],
        input: &Value,
    ) -> Option<&'a Activity> {
        let Some(activity) = self.current_mut(activities) else {
            debug!(target: "chatstream::activity", "Tool input with no current activity");
            return None;
        };
        if let Some(description) = describe_input(activity.kind, input) {
            activity.description = Some(description);
        }
        activity.details = Some(input.clone());
        Some(&*activity)
    }

    /// Complete the current activity from a tool result and clear the pointer.
    pub fn finish<'a>(
        &mut self,
        activities: &'a mut [Activity],
        tool: ActivityKind,
        result: &Value,
        now: DateTime<Utc>,
    ) -> Option<&'a Activity> {
        let Some(activity) = self.current_mut(activities) else {
            debug!(target: "chatstream::activity", "Tool result for {} with no current activity", tool);
            return None;
        };
        if activity.kind != tool {
            debug!(
                target: "chatstream::activity",
                "Tool result for {} applied to current {} activity", tool, activity.kind
            );
        }

        let (status, summary) = summarize_result(activity.kind, result);
        activity.finish(status, Value::String(summary), now);
        self.current = None;
        Some(&*activity)
    }

    fn current_mut<'a>(&self, activities: &'a mut [Activity]) -> Option<&'a mut Activity> {
        let id = self.current.as_deref()?;
        activities.iter_mut().find(|a| a.id == id)
    }
}

/// Short description of what the tool was asked to do.
fn describe_input(kind: ActivityKind, input: &Value) -> Option<String> {
    let description = match (kind, input) {
        (_, Value::String(s)) => s.clone(),
        (ActivityKind::WebSearch, _) => match input.get("query").and_then(Value::as_str) {
            Some(query) => format!("Searching for \"{}\"", query),
            None => return None,
        },
        (ActivityKind::CodeExecution, _) => match input.get("language").and_then(Value::as_str) {
            Some(language) => format!("Running {} code", language),
            None => "Running code".to_string(),
        },
    };
    Some(truncate_chars(&description, MAX_DESCRIPTION_CHARS))
}

/// Decide the final status of a tool result and summarise it for humans.
fn summarize_result(kind: ActivityKind, result: &Value) -> (ActivityStatus, String) {
    if let Some(reason) = failure_reason(result) {
        return (ActivityStatus::Error, format!("Failed: {}", reason));
    }

    let summary = match kind {
        ActivityKind::WebSearch => match result_count(result) {
            Some(1) => "Found 1 result".to_string(),
            Some(n) => format!("Found {} results", n),
            None => "Search completed".to_string(),
        },
        ActivityKind::CodeExecution => "Executed successfully".to_string(),
    };
    (ActivityStatus::Completed, summary)
}

fn failure_reason(result: &Value) -> Option<String> {
    let obj = result.as_object()?;
    match obj.get("error") {
        Some(Value::String(message)) => return Some(truncate_chars(message, MAX_DESCRIPTION_CHARS)),
        Some(Value::Null) | None => {}
        Some(other) => {
            let message = other
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string());
            return Some(truncate_chars(&message, MAX_DESCRIPTION_CHARS));
        }
    }

    let failed = obj.get("success").and_then(Value::as_bool) == Some(false)
        || obj.get("is_error").and_then(Value::as_bool) == Some(true);
    failed.then(|| "tool reported an error".to_string())
}

fn result_count(result: &Value) -> Option<usize> {
    match result {
        Value::Array(items) => Some(items.len()),
        Value::Object(obj) => obj
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::len)
            .or_else(|| obj.get("count").and_then(Value::as_u64).map(|n| n as usize)),
        _ => None,
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// Rolling, session-wide feed of recent activities with FIFO eviction.
#[derive(Debug, Clone)]
pub struct ActivityFeed {
    entries: VecDeque<Activity>,
    capacity: usize,
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self::with_capacity(MAX_FEED_ACTIVITIES)
    }
}

impl ActivityFeed {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a new activity or refresh the stored copy of a known one.
    pub fn record(&mut self, activity: &Activity) {
        if let Some(existing) = self.entries.iter_mut().find(|a| a.id == activity.id) {
            *existing = activity.clone();
            return;
        }
        self.entries.push_back(activity.clone());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Activity> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&Activity> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
