//! End-to-end tests for a turn: transport bytes in, persisted message out.

mod common;

use chatstream_core::session::SESSIONS_KEY;
use chatstream_core::{
    ChatStreamError, KeyValueStore, SessionManager, SessionManagerConfig, TurnInput, TurnRunner,
};
use chatstream_types::{ActivityKind, ActivityStatus, ChatSession, MessageUpdate};
use common::{ScriptedTransport, load_stream_fixture, memory_sessions, rechunk, sse};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_scenario_text_with_score_tag() {
    let frames = ["Hello ", "wor", "ld. ", "<search_quality_score>4</search_quality_score>"]
        .iter()
        .map(|t| json!({"type": "text", "content": t}))
        .collect::<Vec<_>>();
    let runner = TurnRunner::new(ScriptedTransport::new(vec![sse(&frames)]));
    let (mut sessions, _store) = memory_sessions();

    let message = runner.run(&mut sessions, TurnInput::new("Say hello")).await.unwrap();

    assert_eq!(message.content, "Hello world.");
    assert_eq!(message.search_metadata.unwrap().quality_score, Some(4));
    assert!(!message.is_streaming);
    assert!(!message.is_error);
}

#[tokio::test]
async fn test_scenario_search_activity() {
    let frames = vec![
        json!({"type": "tool_start", "content": {"tool": "web_search"}}),
        json!({"type": "tool_result", "content": {"tool": "web_search", "result": {"results": [1, 2, 3]}}}),
    ];
    let runner = TurnRunner::new(ScriptedTransport::new(vec![sse(&frames)]));
    let (mut sessions, _store) = memory_sessions();

    let message = runner.run(&mut sessions, TurnInput::new("Search")).await.unwrap();

    assert_eq!(message.activities.len(), 1);
    let activity = &message.activities[0];
    assert_eq!(activity.kind, ActivityKind::WebSearch);
    assert_eq!(activity.status, ActivityStatus::Completed);
    assert!(activity.details.as_ref().unwrap().to_string().contains('3'));
    assert_eq!(sessions.activity_feed().len(), 1);
    assert_eq!(
        sessions.activity_feed().latest().unwrap().status,
        ActivityStatus::Completed
    );
}

#[tokio::test]
async fn test_scenario_protocol_error_stops_consumption() {
    let bytes = load_stream_fixture("protocol_error");
    // One frame per read so unread chunks remain after the error
    let chunks: Vec<Vec<u8>> = String::from_utf8(bytes)
        .unwrap()
        .split_inclusive("\n\n")
        .map(|s| s.as_bytes().to_vec())
        .collect();
    let total_chunks = chunks.len();
    let transport = ScriptedTransport::new(chunks);
    let reads = transport.reads.clone();
    let runner = TurnRunner::new(transport);
    let (mut sessions, _store) = memory_sessions();

    let message = runner.run(&mut sessions, TurnInput::new("Look it up")).await.unwrap();

    assert!(message.is_error);
    assert!(!message.is_streaming);
    assert!(message.content.contains("upstream model overloaded"));
    assert!(!message.content.contains("never"));
    assert!(message.activities.is_empty());
    assert!(*reads.lock().unwrap() < total_chunks);
    assert!(sessions.current().streaming_message().is_none());
}

#[tokio::test]
async fn test_transport_status_error() {
    let runner = TurnRunner::new(ScriptedTransport::failing(502));
    let (mut sessions, _store) = memory_sessions();

    let message = runner.run(&mut sessions, TurnInput::new("Hello?")).await.unwrap();

    assert!(message.is_error);
    assert!(message.content.contains("502"));
    let stored = sessions.current().messages.last().unwrap().clone();
    assert_eq!(stored, message);
}

#[tokio::test]
async fn test_wrong_content_type_rejected() {
    let transport = ScriptedTransport::new(vec![b"data: {\"type\":\"text\",\"content\":\"x\"}\n".to_vec()])
        .with_content_type("application/json");
    let reads = transport.reads.clone();
    let runner = TurnRunner::new(transport);
    let (mut sessions, _store) = memory_sessions();

    let message = runner.run(&mut sessions, TurnInput::new("Hello?")).await.unwrap();

    assert!(message.is_error);
    assert_eq!(*reads.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_noisy_stream_degrades_gracefully() {
    let runner = TurnRunner::new(ScriptedTransport::new(vec![load_stream_fixture("noisy")]));
    let (mut sessions, _store) = memory_sessions();

    let message = runner.run(&mut sessions, TurnInput::new("Go")).await.unwrap();

    assert!(!message.is_error);
    assert_eq!(message.content, "Partial answer.");
    assert!(message.activities.is_empty());
}

#[tokio::test]
async fn test_full_capture_at_any_chunk_size() {
    let bytes = load_stream_fixture("workflow_build");
    let mut results = Vec::new();

    for size in [1, 3, 7, 64, bytes.len()] {
        let runner = TurnRunner::new(ScriptedTransport::new(rechunk(&bytes, size)));
        let (mut sessions, _store) = memory_sessions();
        let message = runner
            .run(&mut sessions, TurnInput::new("Email me the forecast"))
            .await
            .unwrap();
        results.push(message);
    }

    let first = &results[0];
    assert_eq!(
        first.content,
        "I found a free weather API. Here is a workflow that emails you the forecast every morning."
    );
    let metadata = first.search_metadata.as_ref().unwrap();
    assert_eq!(metadata.quality_score, Some(4));
    assert_eq!(metadata.explanation.as_deref(), Some("Two reputable providers matched."));
    assert_eq!(metadata.queries, Some(vec!["weather api free tier".to_string()]));
    assert_eq!(first.workflow_payload.as_ref().unwrap()["name"], "Morning forecast");

    assert_eq!(first.activities.len(), 2);
    assert_eq!(first.activities[0].details, Some(json!("Found 2 results")));
    assert_eq!(first.activities[0].description.as_deref(), Some("Searching for \"weather api free tier\""));
    assert_eq!(first.activities[1].kind, ActivityKind::CodeExecution);
    assert_eq!(first.activities[1].details, Some(json!("Executed successfully")));
    assert!(first.activities[0].started_at <= first.activities[1].started_at);

    for other in &results[1..] {
        assert_eq!(other.content, first.content);
        assert_eq!(other.search_metadata, first.search_metadata);
        assert_eq!(other.workflow_payload, first.workflow_payload);
        assert_eq!(other.activities.len(), first.activities.len());
    }
}

#[tokio::test]
async fn test_updates_published_in_order() {
    let runner = TurnRunner::new(ScriptedTransport::new(vec![load_stream_fixture("workflow_build")]));
    let mut rx = runner.subscribe();
    let (mut sessions, _store) = memory_sessions();

    runner.run(&mut sessions, TurnInput::new("Email me the forecast")).await.unwrap();

    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    assert!(matches!(updates.first(), Some(MessageUpdate::ActivityStarted { .. })));
    assert!(matches!(updates.last(), Some(MessageUpdate::Finalized { .. })));

    let workflow_at = updates
        .iter()
        .position(|u| matches!(u, MessageUpdate::WorkflowSet { .. }))
        .unwrap();
    let last_content_at = updates
        .iter()
        .rposition(|u| matches!(u, MessageUpdate::ContentChanged { .. }))
        .unwrap();
    assert!(last_content_at < workflow_at);
}

#[tokio::test]
async fn test_history_forwarded_and_persisted() {
    let reply = |text: &str| sse(&[json!({"type": "text", "content": text})]);
    let (mut sessions, store) = memory_sessions();

    let first = ScriptedTransport::new(vec![reply("First answer")]);
    TurnRunner::new(first).run(&mut sessions, TurnInput::new("First question")).await.unwrap();

    let second = ScriptedTransport::new(vec![reply("Second answer")]);
    let requests = second.requests.clone();
    TurnRunner::new(second).run(&mut sessions, TurnInput::new("Second question")).await.unwrap();

    let request = requests.lock().unwrap()[0].clone();
    assert_eq!(request.message, "Second question");
    // Greeting, first question, first answer
    assert_eq!(request.chat_history.len(), 3);
    assert_eq!(request.chat_history[2].content, "First answer");

    let raw = store.get(SESSIONS_KEY).unwrap().unwrap();
    let stored: Vec<ChatSession> = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "First question");
    assert_eq!(stored[0].messages.len(), 5);
}

#[tokio::test]
async fn test_turn_rejected_while_streaming() {
    let (mut sessions, _store) = memory_sessions();
    sessions.begin_turn("still going", None, None).unwrap();

    let runner = TurnRunner::new(ScriptedTransport::new(Vec::new()));
    let err = runner.run(&mut sessions, TurnInput::new("again")).await.unwrap_err();
    assert!(matches!(err, ChatStreamError::TurnInProgress(_)));
}

#[tokio::test]
async fn test_partial_stream_survives_reload() {
    let frames = vec![
        json!({"type": "text", "content": "Partial "}),
        json!({"type": "text", "content": "progress"}),
    ];
    let runner = TurnRunner::new(ScriptedTransport::new(vec![sse(&frames)]).stalling());
    let (mut sessions, store) = memory_sessions();

    // The stream never ends; give up on it the way a killed process would
    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        runner.run(&mut sessions, TurnInput::new("Keep going")),
    )
    .await;
    assert!(outcome.is_err());

    let raw = store.get(SESSIONS_KEY).unwrap().unwrap();
    let stored: Vec<ChatSession> = serde_json::from_str(&raw).unwrap();
    let streaming = stored[0].messages.last().unwrap();
    assert!(streaming.is_streaming);
    assert_eq!(streaming.content, "Partial progress");

    let reloaded = SessionManager::load(store, SessionManagerConfig::default());
    let message = reloaded.current().messages.last().unwrap();
    assert_eq!(message.content, "Partial progress");
    assert!(!message.is_streaming);
    assert!(!message.is_error);
}
