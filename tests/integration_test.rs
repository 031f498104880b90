// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// End-to-end tests: scripted engine → session → HTTP/SSE → client runtime,
/// over a real TCP socket.
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use tether_client::{convert_messages, AgentState, ChatClient, UiPart, UiStatus};
use tether_engine::{ScriptStep, ScriptedEngine};
use tether_protocol::{JsonMap, PermissionBehavior, PermissionResult};
use tether_server::{router, AppState};
use tether_session::SessionManager;

async fn spawn_server(engine: Arc<ScriptedEngine>) -> String {
    let manager = Arc::new(SessionManager::new(engine));
    let app = router(AppState { manager });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

async fn wait_until(
    client: &ChatClient,
    what: &str,
    pred: impl Fn(&AgentState) -> bool,
) -> Arc<AgentState> {
    let mut rx = client.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let snapshot = rx.borrow_and_update().clone();
                if pred(&snapshot) {
                    return snapshot;
                }
            }
            rx.changed().await.expect("snapshot channel closed");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

fn message_start() -> Value {
    json!({ "type": "stream_event", "event": { "type": "message_start" } })
}

fn text_delta(text: &str) -> Value {
    json!({
        "type": "stream_event",
        "event": { "type": "content_block_delta",
                   "delta": { "type": "text_delta", "text": text } },
    })
}

fn success() -> Value {
    json!({ "type": "result", "subtype": "success" })
}

#[tokio::test]
async fn tool_call_lifecycle_reaches_the_ui_shape() {
    let engine = Arc::new(ScriptedEngine::new(vec![ScriptedEngine::turn(vec![
        json!({ "type": "system", "subtype": "init", "session_id": "int-1" }),
        message_start(),
        json!({ "type": "stream_event", "event": {
            "type": "content_block_start",
            "content_block": { "type": "tool_use", "id": "tc-1", "name": "Read", "input": {} },
        }}),
        json!({ "type": "stream_event", "event": {
            "type": "content_block_delta",
            "delta": { "type": "input_json_delta",
                       "partial_json": "{\"file_path\":\"/tmp/test.ts\"}" },
        }}),
        json!({ "type": "assistant", "message": { "content": [
            { "type": "tool_use", "id": "tc-1", "name": "Read",
              "input": { "file_path": "/tmp/test.ts" } },
        ]}}),
        json!({ "type": "user", "message": { "content": [
            { "type": "tool_result", "tool_use_id": "tc-1", "content": "const x = 42;" },
        ]}}),
        message_start(),
        text_delta("The file contains x = 42"),
        json!({ "type": "assistant", "message": { "content": [] } }),
        success(),
    ])]));
    let base = spawn_server(Arc::clone(&engine)).await;

    let client = ChatClient::new(&base);
    client.send_message("read the file").await.unwrap();
    let state = wait_until(&client, "run completion", |s| {
        s.session_id.is_some() && !s.is_running
    })
    .await;

    let messages = convert_messages(&state);
    assert_eq!(messages.len(), 2);
    match &messages[0].content[0] {
        UiPart::ToolCall {
            tool_call_id,
            tool_name,
            args,
            args_text,
            result,
            ..
        } => {
            assert_eq!(tool_call_id, "tc-1");
            assert_eq!(tool_name, "Read");
            assert_eq!(
                args.as_ref().and_then(|a| a["file_path"].as_str()),
                Some("/tmp/test.ts")
            );
            assert_eq!(args_text.as_deref(), Some("{\"file_path\":\"/tmp/test.ts\"}"));
            assert_eq!(result, &Some(json!("const x = 42;")));
        }
        other => panic!("unexpected first part: {other:?}"),
    }
    assert_eq!(
        messages[1].content,
        vec![UiPart::Text {
            text: "The file contains x = 42".into()
        }]
    );
    assert_eq!(messages[1].status, UiStatus::Complete);
}

#[tokio::test]
async fn permission_round_trip_over_http() {
    let mut input = JsonMap::new();
    input.insert("command".into(), json!("rm -rf /"));
    let engine = Arc::new(ScriptedEngine::new(vec![vec![
        ScriptStep::Message(json!({ "type": "system", "subtype": "init", "session_id": "int-p" })),
        ScriptStep::Message(message_start()),
        ScriptStep::Message(text_delta("Checking...")),
        ScriptStep::Permission {
            tool_name: "Bash".into(),
            input,
            tool_use_id: Some("tc-perm".into()),
            reason: Some("dangerous".into()),
        },
        ScriptStep::Message(text_delta(" Allowed.")),
        ScriptStep::Message(success()),
    ]]));
    let base = spawn_server(Arc::clone(&engine)).await;

    let client = ChatClient::new(&base);
    client.send_message("run it").await.unwrap();

    // The engine is now suspended inside its tool gate.
    let state = wait_until(&client, "permission request", |s| {
        !s.pending_permissions.is_empty()
    })
    .await;
    let pending = &state.pending_permissions[0];
    assert_eq!(pending.tool_name, "Bash");
    assert_eq!(pending.tool_use_id.as_deref(), Some("tc-perm"));
    assert_eq!(pending.reason.as_deref(), Some("dangerous"));
    assert!(state.is_running);

    client
        .respond_to_permission(&pending.id, PermissionBehavior::Allow, None)
        .await
        .unwrap();

    let state = wait_until(&client, "run completion", |s| !s.is_running).await;
    assert!(state.pending_permissions.is_empty());
    let messages = convert_messages(&state);
    assert_eq!(
        messages[0].content,
        vec![UiPart::Text {
            text: "Checking... Allowed.".into()
        }]
    );

    let decisions = engine.decisions();
    assert_eq!(decisions.len(), 1);
    match &decisions[0] {
        PermissionResult::Allow { updated_input } => {
            assert_eq!(updated_input["command"], "rm -rf /");
        }
        other => panic!("engine saw the wrong decision: {other:?}"),
    }
}

#[tokio::test]
async fn denied_permission_reaches_the_engine() {
    let engine = Arc::new(ScriptedEngine::new(vec![vec![
        ScriptStep::Message(json!({ "type": "system", "subtype": "init", "session_id": "int-d" })),
        ScriptStep::Message(message_start()),
        ScriptStep::Permission {
            tool_name: "Bash".into(),
            input: JsonMap::new(),
            tool_use_id: None,
            reason: None,
        },
        ScriptStep::Message(text_delta("Understood, not running it.")),
        ScriptStep::Message(success()),
    ]]));
    let base = spawn_server(Arc::clone(&engine)).await;

    let client = ChatClient::new(&base);
    client.send_message("run it").await.unwrap();
    let state = wait_until(&client, "permission request", |s| {
        !s.pending_permissions.is_empty()
    })
    .await;

    client
        .respond_to_permission(&state.pending_permissions[0].id, PermissionBehavior::Deny, None)
        .await
        .unwrap();
    wait_until(&client, "run completion", |s| !s.is_running).await;

    assert_eq!(
        engine.decisions(),
        vec![PermissionResult::Deny {
            message: "User denied".into()
        }]
    );
}

#[tokio::test]
async fn question_round_trip_over_http() {
    let engine = Arc::new(ScriptedEngine::new(vec![vec![
        ScriptStep::Message(json!({ "type": "system", "subtype": "init", "session_id": "int-q" })),
        ScriptStep::Message(message_start()),
        ScriptStep::Question {
            question: "Deploy to?".into(),
            options: vec![
                tether_protocol::QuestionOption::new("staging", "the safe one"),
                tether_protocol::QuestionOption::new("production", "the scary one"),
            ],
        },
        ScriptStep::Message(text_delta("Deploying to staging.")),
        ScriptStep::Message(success()),
    ]]));
    let base = spawn_server(Arc::clone(&engine)).await;

    let client = ChatClient::new(&base);
    client.send_message("deploy").await.unwrap();

    let state = wait_until(&client, "question", |s| !s.pending_questions.is_empty()).await;
    let question = &state.pending_questions[0];
    assert_eq!(question.question, "Deploy to?");
    assert_eq!(question.options.len(), 2);

    client
        .respond_to_question(&question.id, "staging")
        .await
        .unwrap();

    let state = wait_until(&client, "run completion", |s| !s.is_running).await;
    assert!(state.pending_questions.is_empty());
    assert_eq!(engine.answers(), vec!["staging".to_string()]);
}

#[tokio::test]
async fn multi_turn_conversation_over_http() {
    let engine = Arc::new(ScriptedEngine::new(vec![
        ScriptedEngine::turn(vec![
            json!({ "type": "system", "subtype": "init", "session_id": "int-m" }),
            message_start(),
            text_delta("Hi there!"),
            success(),
        ]),
        ScriptedEngine::turn(vec![
            message_start(),
            text_delta("Still here."),
            success(),
        ]),
    ]));
    let base = spawn_server(engine).await;

    let client = ChatClient::new(&base);
    client.send_message("Hello").await.unwrap();
    wait_until(&client, "first turn", |s| {
        s.messages.len() == 1 && !s.is_running
    })
    .await;

    client.send_message("Follow up").await.unwrap();
    let state = wait_until(&client, "second turn", |s| {
        s.messages.len() == 2 && !s.is_running
    })
    .await;

    let messages = convert_messages(&state);
    assert_eq!(messages.len(), 2);
    assert_eq!(
        messages[1].content,
        vec![UiPart::Text {
            text: "Still here.".into()
        }]
    );
}

#[tokio::test]
async fn engine_failure_surfaces_as_error_state() {
    let engine = Arc::new(ScriptedEngine::new(vec![vec![
        ScriptStep::Message(json!({ "type": "system", "subtype": "init", "session_id": "int-e" })),
        ScriptStep::Message(message_start()),
        ScriptStep::Fail("engine exploded".into()),
    ]]));
    let base = spawn_server(engine).await;

    let client = ChatClient::new(&base);
    client.send_message("Hello").await.unwrap();
    let state = wait_until(&client, "error state", |s| s.error.is_some()).await;
    assert!(!state.is_running);
    assert!(state.error.as_deref().unwrap().contains("engine exploded"));
}
