//! Plain-text rendering of sessions and messages for the terminal.

use chatstream_types::{
    Activity, ActivityStatus, ChatMessage, ChatRole, ChatSession, MessageUpdate, SessionSummary,
};
use std::fmt::Write;

/// One line per session, most recent first, current session starred.
pub fn session_list(sessions: &[SessionSummary], current_id: &str) -> String {
    let mut out = String::new();
    for s in sessions {
        let marker = if s.id == current_id { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{} {}  {}  ({} messages, updated {})",
            marker,
            s.id,
            s.title,
            s.message_count,
            s.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    out
}

pub fn session(session: &ChatSession) -> String {
    let mut out = format!("# {}\n", session.title);
    for m in &session.messages {
        out.push('\n');
        out.push_str(&message(m));
    }
    out
}

/// Full rendering of a message, including metadata, activities and payload.
pub fn message(m: &ChatMessage) -> String {
    let who = match m.role {
        ChatRole::User => "you",
        ChatRole::Assistant => "assistant",
    };
    let mut out = format!("[{}{}] {}\n", who, if m.is_error { " (error)" } else { "" }, m.content);

    for a in &m.activities {
        let _ = writeln!(out, "  - {}", activity(a));
    }

    if let Some(meta) = &m.search_metadata {
        if let Some(score) = meta.quality_score {
            let _ = writeln!(out, "  search quality: {}/5", score);
        }
        if let Some(explanation) = &meta.explanation {
            let _ = writeln!(out, "  reflection: {}", explanation);
        }
        for q in meta.queries.iter().flatten() {
            let _ = writeln!(out, "  query: {}", q);
        }
    }

    if let Some(payload) = &m.workflow_payload {
        let pretty = serde_json::to_string_pretty(payload).unwrap_or_default();
        let _ = writeln!(out, "  workflow:\n{}", indent(&pretty, 4));
    }
    out
}

pub fn activity(a: &Activity) -> String {
    let status = match a.status {
        ActivityStatus::Running => "running",
        ActivityStatus::Completed => "done",
        ActivityStatus::Error => "failed",
    };
    let mut line = format!("{} [{}]", a.title, status);
    if let Some(description) = &a.description {
        let _ = write!(line, " {}", description);
    }
    if let Some(summary) = a.details.as_ref().and_then(|d| d.as_str()) {
        let _ = write!(line, ": {}", summary);
    }
    if let Some(ms) = a.duration_ms {
        let _ = write!(line, " ({} ms)", ms);
    }
    line
}

/// Compact line for live progress output.
pub fn update(u: &MessageUpdate) -> String {
    match u {
        MessageUpdate::ContentChanged { content, .. } => {
            format!("text: {} chars", content.chars().count())
        }
        MessageUpdate::WorkflowSet { .. } => "workflow received".to_string(),
        MessageUpdate::ActivityStarted { activity: a, .. }
        | MessageUpdate::ActivityUpdated { activity: a, .. }
        | MessageUpdate::ActivityFinished { activity: a, .. } => activity(a),
        MessageUpdate::Finalized { message } => {
            if message.is_error {
                "finished with error".to_string()
            } else {
                "finished".to_string()
            }
        }
    }
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|l| format!("{}{}", pad, l))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatstream_types::{ActivityKind, SearchMetadata};
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_message_rendering() {
        let mut m = ChatMessage::assistant("Here you go.");
        let mut a = Activity::start(ActivityKind::WebSearch, Utc::now());
        a.description = Some("Searching for \"rust\"".into());
        a.finish(ActivityStatus::Completed, json!("Found 3 results"), a.started_at);
        m.activities.push(a);
        m.search_metadata = Some(SearchMetadata {
            quality_score: Some(4),
            explanation: None,
            queries: Some(vec!["rust".into()]),
        });

        let text = message(&m);
        assert!(text.starts_with("[assistant] Here you go."));
        assert!(text.contains("Searching the web [done] Searching for \"rust\": Found 3 results (0 ms)"));
        assert!(text.contains("search quality: 4/5"));
        assert!(text.contains("query: rust"));
    }

    #[test]
    fn test_session_list_marks_current() {
        let s = ChatSession::new("Hi");
        let listing = session_list(&[s.summary()], &s.id);
        assert!(listing.starts_with("* "));
        assert!(listing.contains("1 messages"));
    }
}
