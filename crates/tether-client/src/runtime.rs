// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Client runtime — owns the SSE connection and the HTTP calls, and
//! publishes referentially-stable state snapshots.
//!
//! The first `send_message` creates the session and opens the event stream;
//! later calls post follow-up turns into the same session. Every decoded
//! event is folded through the reducer and a fresh `Arc<AgentState>` snapshot
//! is published on a `watch` channel — UI layers either poll [`ChatClient::snapshot`]
//! or await changes on [`ChatClient::subscribe`].
//!
//! SSE frames can be split across TCP chunks, so the consumer carries a
//! remainder buffer and only parses complete lines. A transport error or the
//! `[DONE]` terminator disconnects silently; undecodable payloads are logged
//! and dropped, never thrown.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tether_protocol::{decode_event, JsonMap, PermissionBehavior};

use crate::reducer::{apply_event, AgentState};

/// Handle to one conversation from the UI side.
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    session_id: Mutex<Option<String>>,
    state: Arc<Mutex<AgentState>>,
    snapshot_tx: Arc<watch::Sender<Arc<AgentState>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl ChatClient {
    /// `base_url` is the adapter server root, e.g. `http://127.0.0.1:8787`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(AgentState::default()));
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_id: Mutex::new(None),
            state: Arc::new(Mutex::new(AgentState::default())),
            snapshot_tx: Arc::new(snapshot_tx),
            consumer: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().expect("session id lock").clone()
    }

    /// Current state snapshot. The returned `Arc` is stable until the next
    /// event arrives, so equality of pointers means "nothing changed".
    pub fn snapshot(&self) -> Arc<AgentState> {
        self.snapshot_tx.borrow().clone()
    }

    /// Await state changes. Each change carries the new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AgentState>> {
        self.snapshot_tx.subscribe()
    }

    /// Send a user turn. The first call creates the session and connects the
    /// event stream; later calls post into the existing session.
    pub async fn send_message(&self, text: &str) -> anyhow::Result<()> {
        let existing = self.session_id();
        match existing {
            None => {
                let body: Value = self
                    .http
                    .post(format!("{}/sessions", self.base_url))
                    .json(&json!({ "message": text }))
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                let id = body["sessionId"]
                    .as_str()
                    .context("create response is missing 'sessionId'")?
                    .to_string();
                *self.session_id.lock().expect("session id lock") = Some(id.clone());
                self.connect(id);
            }
            Some(id) => {
                self.post(
                    &format!("/sessions/{id}/messages"),
                    json!({ "message": text }),
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Resolve a pending permission.
    pub async fn respond_to_permission(
        &self,
        id: &str,
        behavior: PermissionBehavior,
        updated_input: Option<JsonMap>,
    ) -> anyhow::Result<()> {
        let session_id = self.session_id().context("no active session")?;
        let mut body = json!({ "kind": "permission", "id": id, "behavior": behavior });
        if let Some(input) = updated_input {
            body["updatedInput"] = Value::Object(input);
        }
        self.post(&format!("/sessions/{session_id}/respond"), body)
            .await
    }

    /// Answer a pending question.
    pub async fn respond_to_question(&self, id: &str, answer: &str) -> anyhow::Result<()> {
        let session_id = self.session_id().context("no active session")?;
        self.post(
            &format!("/sessions/{session_id}/respond"),
            json!({ "kind": "question", "id": id, "answer": answer }),
        )
        .await
    }

    /// Ask the engine to stop its current turn.
    pub async fn interrupt(&self) -> anyhow::Result<()> {
        let session_id = self.session_id().context("no active session")?;
        self.post(&format!("/sessions/{session_id}/interrupt"), json!({}))
            .await
    }

    /// Drop the event stream connection. The accumulated state stays
    /// readable; there is no reconnect.
    pub fn close(&self) {
        if let Some(handle) = self.consumer.lock().expect("consumer lock").take() {
            handle.abort();
        }
    }

    async fn post(&self, path: &str, body: Value) -> anyhow::Result<()> {
        self.http
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn connect(&self, session_id: String) {
        let url = format!("{}/sessions/{session_id}/events", self.base_url);
        let handle = tokio::spawn(consume(
            self.http.clone(),
            url,
            Arc::clone(&self.state),
            Arc::clone(&self.snapshot_tx),
        ));
        *self.consumer.lock().expect("consumer lock") = Some(handle);
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read the SSE stream to its end, folding every event into the state.
async fn consume(
    http: reqwest::Client,
    url: String,
    state: Arc<Mutex<AgentState>>,
    snapshot_tx: Arc<watch::Sender<Arc<AgentState>>>,
) {
    let response = match http.get(&url).send().await {
        Ok(r) => r,
        Err(e) => {
            debug!("event stream connect failed: {e}");
            return;
        }
    };

    let mut bytes = response.bytes_stream();
    // Lines can arrive split across chunks; only complete lines are parsed.
    let mut buf = String::new();
    while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
            Ok(b) => b,
            Err(e) => {
                debug!("event stream transport error: {e}");
                return;
            }
        };
        buf.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(pos) = buf.find('\n') {
            let line = buf[..pos].trim_end_matches('\r').to_string();
            buf.drain(..=pos);
            if line.trim().is_empty() {
                continue;
            }
            match decode_event(&line) {
                Ok(Some(event)) => {
                    let snapshot = {
                        let mut state = state.lock().expect("state lock");
                        apply_event(&mut state, &event);
                        Arc::new(state.clone())
                    };
                    snapshot_tx.send_replace(snapshot);
                }
                Ok(None) => {
                    debug!("event stream finished");
                    return;
                }
                Err(e) => {
                    // Never throw from the consumer; drop the frame.
                    warn!("undecodable SSE line: {e}");
                }
            }
        }
    }
    debug!("event stream closed by the server");
}

// ── Unit tests ────────────────────────────────────────────────────────────────
