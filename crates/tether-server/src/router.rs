// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! HTTP routes.
//!
//! | Method | Path                      | Purpose                              |
//! |--------|---------------------------|--------------------------------------|
//! | GET    | `/healthz`                | liveness probe                       |
//! | POST   | `/sessions`               | create a session, start the engine   |
//! | GET    | `/sessions`               | ids of live sessions                 |
//! | DELETE | `/sessions/:id`           | abort + remove                       |
//! | GET    | `/sessions/:id/events`    | the session's SSE event stream       |
//! | POST   | `/sessions/:id/messages`  | queue another user turn              |
//! | POST   | `/sessions/:id/respond`   | resolve a permission / answer a question |
//! | POST   | `/sessions/:id/interrupt` | stop the engine's current turn       |
//!
//! The SSE responder drains the session's output channel, writing one
//! `data: …` frame per event, and always finishes with `data: [DONE]` —
//! engine failures arrive as ordinary `error` events on the channel, so the
//! stream still terminates cleanly.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use tether_protocol::{encode_done, encode_event, PermissionBehavior};
use tether_session::{Session, SessionManager};

use crate::error::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/:id", delete(delete_session))
        .route("/sessions/:id/events", get(session_events))
        .route("/sessions/:id/messages", post(push_message))
        .route("/sessions/:id/respond", post(respond))
        .route("/sessions/:id/interrupt", post(interrupt_session))
        .with_state(state)
}

fn lookup(state: &AppState, id: &str) -> Result<Arc<Session>, ServerError> {
    // An unparseable id cannot name a session, so it gets the same 404 as an
    // unknown one.
    let uuid =
        Uuid::parse_str(id).map_err(|_| ServerError::UnknownSession(id.to_string()))?;
    state
        .manager
        .get(uuid)
        .ok_or_else(|| ServerError::UnknownSession(id.to_string()))
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    message: String,
}

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<Value>, ServerError> {
    let session = state
        .manager
        .create(&req.message)
        .await
        .map_err(|e| ServerError::EngineStart(e.to_string()))?;
    Ok(Json(json!({ "sessionId": session.id() })))
}

async fn list_sessions(State(state): State<AppState>) -> Json<Value> {
    let sessions: Vec<Value> = state
        .manager
        .ids()
        .into_iter()
        .map(|id| json!({ "sessionId": id }))
        .collect();
    Json(json!({ "sessions": sessions }))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let session = lookup(&state, &id)?;
    state.manager.delete(session.id());
    Ok(Json(json!({ "ok": true })))
}

async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let session = lookup(&state, &id)?;
    let rx = session
        .take_events()
        .ok_or(ServerError::StreamTaken(session.id()))?;
    debug!(session = %session.id(), "event stream subscribed");

    let frames = rx
        .into_stream()
        .filter_map(|event| async move {
            match encode_event(&event) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!("dropping unencodable event: {e}");
                    None
                }
            }
        })
        .chain(stream::once(async { encode_done() }))
        .map(|frame| Ok::<Bytes, std::convert::Infallible>(Bytes::from(frame)));

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct PushMessageRequest {
    message: String,
}

async fn push_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PushMessageRequest>,
) -> Result<Json<Value>, ServerError> {
    let session = lookup(&state, &id)?;
    session.push_message(&req.message);
    Ok(Json(json!({ "ok": true })))
}

async fn interrupt_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let session = lookup(&state, &id)?;
    session.interrupt();
    Ok(Json(json!({ "ok": true })))
}

/// The respond body is parsed by hand: its shape depends on `kind`, and every
/// malformed variant must come back as a 400 with a JSON error body rather
/// than an extractor rejection.
async fn respond(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ServerError> {
    let session = lookup(&state, &id)?;
    let pending_id = body["id"].as_str().unwrap_or("");

    match body["kind"].as_str().unwrap_or("") {
        "permission" => {
            let behavior = match body["behavior"].as_str() {
                Some("allow") => PermissionBehavior::Allow,
                Some("deny") => PermissionBehavior::Deny,
                _ => {
                    return Err(ServerError::BadRequest(
                        "'behavior' must be 'allow' or 'deny'".to_string(),
                    ))
                }
            };
            let updated_input = body["updatedInput"].as_object().cloned();
            session
                .gate()
                .resolve(pending_id, behavior, updated_input)
                .map_err(|e| ServerError::BadRequest(e.to_string()))?;
        }
        "question" => {
            let answer = body["answer"].as_str().ok_or_else(|| {
                ServerError::BadRequest("'answer' must be a string".to_string())
            })?;
            session
                .gate()
                .answer_question(pending_id, answer)
                .map_err(|e| ServerError::BadRequest(e.to_string()))?;
        }
        other => {
            return Err(ServerError::BadRequest(format!(
                "unknown respond kind '{other}'"
            )))
        }
    }
    Ok(Json(json!({ "ok": true })))
}

// ── Unit tests ────────────────────────────────────────────────────────────────
