// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `Session` — one conversation wired to one long-running engine invocation —
//! and the `SessionManager` that owns them all.
//!
//! A session exclusively owns its input channel (user turns), its output
//! channel (normalized events), its translator, and its permission gate. The
//! engine invocation is driven by a background task that folds every engine
//! message through the translator and pushes the produced events onto the
//! output channel; when the engine completes, fails, or the session is
//! aborted, the output channel closes and the SSE responder sees
//! end-of-stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use tether_engine::{user_message, Engine, EngineHandle, MessageStream, QueryRequest};
use tether_protocol::AgentEvent;

use crate::channel::{push_channel, PushReceiver, PushSender};
use crate::gate::PermissionGate;
use crate::translate::Translator;

/// One live conversation.
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    gate: Arc<PermissionGate>,
    input: PushSender<Value>,
    output: PushSender<AgentEvent>,
    /// Handed out once to the (single) event subscriber.
    events: Mutex<Option<PushReceiver<AgentEvent>>>,
    engine_handle: EngineHandle,
    aborted: Arc<AtomicBool>,
}

impl Session {
    /// Invoke the engine and start the driver task.
    pub async fn start(engine: &dyn Engine, initial_prompt: &str) -> anyhow::Result<Self> {
        let id = Uuid::new_v4();
        let (input_tx, input_rx) = push_channel::<Value>();
        let (output_tx, output_rx) = push_channel::<AgentEvent>();
        let gate = Arc::new(PermissionGate::new(output_tx.clone()));

        let invocation = engine
            .query(QueryRequest {
                prompt: Box::pin(input_rx.into_stream()),
                permissions: Arc::clone(&gate) as _,
            })
            .await?;

        input_tx.push(user_message(initial_prompt));

        let aborted = Arc::new(AtomicBool::new(false));
        tokio::spawn(drive(
            id,
            invocation.messages,
            output_tx.clone(),
            Arc::clone(&aborted),
        ));

        Ok(Self {
            id,
            created_at: Utc::now(),
            gate,
            input: input_tx,
            output: output_tx,
            events: Mutex::new(Some(output_rx)),
            engine_handle: invocation.handle,
            aborted,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The session's event stream. There is exactly one; the first caller
    /// takes it and later callers get `None`.
    pub fn take_events(&self) -> Option<PushReceiver<AgentEvent>> {
        self.events.lock().expect("events lock").take()
    }

    /// Queue another user turn. Silently dropped after abort, like any push
    /// onto a closed channel.
    pub fn push_message(&self, text: &str) {
        self.input.push(user_message(text));
    }

    /// The gate, for resolving approvals and answering questions.
    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    /// Ask the engine to stop its current turn without ending the session.
    pub fn interrupt(&self) {
        self.engine_handle.interrupt();
    }

    /// Tear the session down: the driver stops between messages, both
    /// channels close, and the engine's abort handle is signalled.
    pub fn abort(&self) {
        if self.aborted.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(id = %self.id, "session aborted");
        self.input.close();
        self.output.close();
        self.engine_handle.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Background driver: engine messages → translator → output channel.
async fn drive(
    session_id: Uuid,
    mut messages: MessageStream,
    output: PushSender<AgentEvent>,
    aborted: Arc<AtomicBool>,
) {
    let mut translator = Translator::new();
    while let Some(item) = messages.next().await {
        if aborted.load(Ordering::SeqCst) {
            break;
        }
        match item {
            Ok(msg) => {
                // One engine message may produce several events; push them
                // contiguously. Gate traffic cannot interleave here: the gate
                // only emits while the engine is suspended in its callback,
                // never mid-message.
                for event in translator.translate(&msg) {
                    output.push(event);
                }
            }
            Err(e) => {
                error!(%session_id, "engine stream failed: {e:#}");
                output.push(AgentEvent::Error {
                    message: e.to_string(),
                });
                break;
            }
        }
    }
    debug!(%session_id, "session driver finished");
    output.close();
}

// ── Manager ───────────────────────────────────────────────────────────────────

/// Owns the `id → Session` map. Created once at server startup with the
/// engine backend all sessions will run against.
pub struct SessionManager {
    engine: Arc<dyn Engine>,
    sessions: Mutex<HashMap<Uuid, Arc<Session>>>,
}

impl SessionManager {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn create(&self, initial_prompt: &str) -> anyhow::Result<Arc<Session>> {
        let session = Arc::new(Session::start(self.engine.as_ref(), initial_prompt).await?);
        info!(id = %session.id(), "session created");
        self.sessions
            .lock()
            .expect("session map lock")
            .insert(session.id(), Arc::clone(&session));
        Ok(session)
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .expect("session map lock")
            .get(&id)
            .cloned()
    }

    /// Abort and remove. Returns false when the id is unknown.
    pub fn delete(&self, id: Uuid) -> bool {
        let removed = self.sessions.lock().expect("session map lock").remove(&id);
        match removed {
            Some(session) => {
                session.abort();
                true
            }
            None => false,
        }
    }

    /// Ids of live sessions, oldest first.
    pub fn ids(&self) -> Vec<Uuid> {
        let map = self.sessions.lock().expect("session map lock");
        let mut entries: Vec<(DateTime<Utc>, Uuid)> = map
            .values()
            .map(|s| (s.created_at(), s.id()))
            .collect();
        entries.sort();
        entries.into_iter().map(|(_, id)| id).collect()
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
