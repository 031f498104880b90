// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The contract between the adapter and an upstream agent engine.
//!
//! ```text
//! Session                                Engine backend
//!    │                                       │
//!    │── query(prompt, permissions) ────────►│  spawns its run loop
//!    │◄─ EngineInvocation{messages, handle} ─│
//!    │                                       │
//!    │   … messages stream drains …          │
//!    │◄─ can_use_tool(name, input) ──────────│  (suspends the engine)
//!    │── PermissionResult ──────────────────►│  (resumes it)
//!    │                                       │
//!    │── handle.abort() ────────────────────►│  run loop tears down
//! ```
//!
//! The prompt is itself a stream: the engine suspends on it between turns,
//! which is what makes multi-turn conversations work without re-invoking the
//! engine.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::watch;

use tether_protocol::{JsonMap, PermissionResult, QuestionOption};

/// Messages produced by a running engine. An `Err` item ends the run.
pub type MessageStream = Pin<Box<dyn Stream<Item = anyhow::Result<Value>> + Send>>;

/// User turns fed to the engine, already in engine shape (see [`user_message`]).
pub type PromptStream = Pin<Box<dyn Stream<Item = Value> + Send>>;

/// Optional context the engine attaches to a tool-gate callback.
#[derive(Debug, Clone, Default)]
pub struct ToolUseContext {
    pub tool_use_id: Option<String>,
    pub reason: Option<String>,
}

/// The out-of-band hooks the engine calls mid-run: the tool gate proper and
/// the user-question channel.
///
/// Both futures suspend the engine until a response arrives from out-of-band
/// user input — possibly much later, possibly never (abort).
#[async_trait]
pub trait ToolGate: Send + Sync {
    /// Called before executing a tool; the engine proceeds with the returned
    /// (possibly edited) input, or receives the denial.
    async fn can_use_tool(
        &self,
        tool_name: &str,
        input: JsonMap,
        context: ToolUseContext,
    ) -> anyhow::Result<PermissionResult>;

    /// Ask the user a multiple-choice question and wait for the answer.
    async fn ask_user(
        &self,
        question: &str,
        options: Vec<QuestionOption>,
    ) -> anyhow::Result<String>;
}

/// Everything an engine needs to start a run.
pub struct QueryRequest {
    pub prompt: PromptStream,
    pub permissions: Arc<dyn ToolGate>,
}

/// Control signal observed by a running engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSignal {
    Run,
    /// Stop the current turn but keep the invocation alive.
    Interrupt,
    /// Tear the invocation down; the message stream ends.
    Abort,
}

/// Cheap-to-clone handle for signalling a running engine.
///
/// Backed by a `watch` channel so a signal sent before the engine starts
/// listening is still observed (no lost-wakeup window).
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: Arc<watch::Sender<EngineSignal>>,
}

impl EngineHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(EngineSignal::Run);
        Self { tx: Arc::new(tx) }
    }

    /// Request the engine stop its current turn. No-op after abort.
    pub fn interrupt(&self) {
        if *self.tx.borrow() != EngineSignal::Abort {
            self.tx.send_replace(EngineSignal::Interrupt);
        }
    }

    /// Tear the invocation down. Idempotent.
    pub fn abort(&self) {
        self.tx.send_replace(EngineSignal::Abort);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow() == EngineSignal::Abort
    }

    /// Receiver for the engine's run loop to observe signals on.
    pub fn subscribe(&self) -> watch::Receiver<EngineSignal> {
        self.tx.subscribe()
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Completes once the handle has been aborted.
pub async fn aborted(signal: &mut watch::Receiver<EngineSignal>) {
    while *signal.borrow() != EngineSignal::Abort {
        if signal.changed().await.is_err() {
            // Sender gone: the invocation owner dropped everything. Treat as
            // an abort so run loops unwind instead of spinning.
            return;
        }
    }
}

/// A started engine run.
pub struct EngineInvocation {
    pub messages: MessageStream,
    pub handle: EngineHandle,
}

impl std::fmt::Debug for EngineInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineInvocation")
            .field("messages", &"<stream>")
            .field("handle", &self.handle)
            .finish()
    }
}

/// An upstream agent engine, opaque to the rest of the adapter.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn query(&self, request: QueryRequest) -> anyhow::Result<EngineInvocation>;
}

/// Build the engine-shaped user message for one turn of text input.
///
/// The `session_id` field is filled in by the engine itself; the adapter
/// always sends it empty.
pub fn user_message(text: &str) -> Value {
    json!({
        "type": "user",
        "message": { "role": "user", "content": text },
        "parent_tool_use_id": null,
        "session_id": "",
    })
}

// ── Unit tests ────────────────────────────────────────────────────────────────
