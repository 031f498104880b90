// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! In-process engine backends: an echo engine for wiring smoke tests and a
//! scripted engine for exact-sequence tests.
//!
//! A script is a list of turns; one turn is consumed per user message read
//! from the prompt stream, so the engine genuinely suspends between turns the
//! way a real one does. Steps can emit raw engine messages, call the tool
//! gate (suspending until the user responds), or fail the run.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio_stream::wrappers::UnboundedReceiverStream;

use tether_protocol::{JsonMap, PermissionResult, QuestionOption};

use crate::contract::{
    aborted, Engine, EngineHandle, EngineInvocation, EngineSignal, QueryRequest, ToolUseContext,
};

/// One step of a scripted turn.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit a raw engine message.
    Message(Value),
    /// Call the permission handler and wait for the decision.
    Permission {
        tool_name: String,
        input: JsonMap,
        tool_use_id: Option<String>,
        reason: Option<String>,
    },
    /// Ask the user a question and wait for the answer.
    Question {
        question: String,
        options: Vec<QuestionOption>,
    },
    /// Fail the run with an engine error.
    Fail(String),
}

/// Deterministic engine that echoes each user turn back as assistant text.
/// Useful as a wiring smoke test: the full adapter path runs without any
/// external process or network.
#[derive(Default)]
pub struct EchoEngine;

#[async_trait]
impl Engine for EchoEngine {
    async fn query(&self, request: QueryRequest) -> anyhow::Result<EngineInvocation> {
        let handle = EngineHandle::new();
        let mut signal = handle.subscribe();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<anyhow::Result<Value>>();
        let mut prompt = request.prompt;

        tokio::spawn(async move {
            let session_id = format!("echo-{}", std::process::id());
            let mut announced = false;
            loop {
                let next_user = tokio::select! {
                    m = prompt.next() => m,
                    () = aborted(&mut signal) => return,
                };
                let Some(user) = next_user else { return };
                let text = user["message"]["content"].as_str().unwrap_or("").to_string();

                let mut batch = Vec::new();
                if !announced {
                    announced = true;
                    batch.push(serde_json::json!({
                        "type": "system", "subtype": "init", "session_id": session_id,
                    }));
                }
                batch.push(serde_json::json!({
                    "type": "stream_event", "event": { "type": "message_start" },
                }));
                batch.push(serde_json::json!({
                    "type": "stream_event",
                    "event": { "type": "content_block_delta",
                               "delta": { "type": "text_delta", "text": format!("ECHO: {text}") } },
                }));
                batch.push(serde_json::json!({ "type": "result", "subtype": "success" }));
                for msg in batch {
                    if tx.send(Ok(msg)).is_err() {
                        return;
                    }
                }
            }
        });

        Ok(EngineInvocation {
            messages: Box::pin(UnboundedReceiverStream::new(rx)),
            handle,
        })
    }
}

/// Pre-scripted engine. The whole script belongs to the first `query` call;
/// later calls see an empty script and complete immediately.
pub struct ScriptedEngine {
    turns: Mutex<VecDeque<Vec<ScriptStep>>>,
    decisions: Arc<Mutex<Vec<PermissionResult>>>,
    answers: Arc<Mutex<Vec<String>>>,
}

impl ScriptedEngine {
    pub fn new(turns: Vec<Vec<ScriptStep>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            decisions: Arc::new(Mutex::new(Vec::new())),
            answers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience: a turn that only emits messages.
    pub fn turn(messages: Vec<Value>) -> Vec<ScriptStep> {
        messages.into_iter().map(ScriptStep::Message).collect()
    }

    /// Tool-gate decisions observed so far, in call order.
    pub fn decisions(&self) -> Vec<PermissionResult> {
        self.decisions.lock().expect("decisions lock").clone()
    }

    /// Question answers observed so far, in call order.
    pub fn answers(&self) -> Vec<String> {
        self.answers.lock().expect("answers lock").clone()
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn query(&self, request: QueryRequest) -> anyhow::Result<EngineInvocation> {
        let mut turns = std::mem::take(&mut *self.turns.lock().expect("script lock"));
        let decisions = Arc::clone(&self.decisions);
        let answers = Arc::clone(&self.answers);
        let handle = EngineHandle::new();
        let mut signal = handle.subscribe();

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<anyhow::Result<Value>>();
        let permissions = request.permissions;
        let mut prompt = request.prompt;

        tokio::spawn(async move {
            loop {
                // Suspend on the prompt between turns; an abort while parked
                // here ends the run.
                let next_user = tokio::select! {
                    m = prompt.next() => m,
                    () = aborted(&mut signal) => return,
                };
                if next_user.is_none() {
                    return;
                }
                let Some(steps) = turns.pop_front() else {
                    return;
                };

                for step in steps {
                    if *signal.borrow() == EngineSignal::Abort {
                        return;
                    }
                    match step {
                        ScriptStep::Message(v) => {
                            if tx.send(Ok(v)).is_err() {
                                return;
                            }
                        }
                        ScriptStep::Fail(msg) => {
                            let _ = tx.send(Err(anyhow!(msg)));
                            return;
                        }
                        ScriptStep::Permission {
                            tool_name,
                            input,
                            tool_use_id,
                            reason,
                        } => {
                            let context = ToolUseContext {
                                tool_use_id,
                                reason,
                            };
                            match permissions.can_use_tool(&tool_name, input, context).await {
                                Ok(decision) => {
                                    decisions.lock().expect("decisions lock").push(decision);
                                }
                                Err(_) => return,
                            }
                        }
                        ScriptStep::Question { question, options } => {
                            match permissions.ask_user(&question, options).await {
                                Ok(answer) => {
                                    answers.lock().expect("answers lock").push(answer);
                                }
                                Err(_) => return,
                            }
                        }
                    }
                }

                // Script exhausted: the run is over. A real engine would keep
                // waiting for turns, but tests need deterministic termination.
                if turns.is_empty() {
                    return;
                }
            }
        });

        Ok(EngineInvocation {
            messages: Box::pin(UnboundedReceiverStream::new(rx)),
            handle,
        })
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
