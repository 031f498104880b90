// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Permission gate — the bidirectional RPC bridge between the engine's
//! synchronous tool-gate callback and out-of-band user responses.
//!
//! ```text
//! Engine task                       Gate                     Router handler
//!     │                              │                            │
//!     │── can_use_tool(name, input) ►│  register perm_N,          │
//!     │        (suspends on oneshot) │  emit permission_request   │
//!     │                              │◄── resolve(perm_N, allow) ─│
//!     │                              │  emit permission_resolved  │
//!     │◄── PermissionResult ─────────│                            │
//!     │   (engine resumes)           │                            │
//! ```
//!
//! Any number of permissions and questions may be pending at once; they
//! resolve independently in any order. Pending entries of an aborted session
//! are simply torn down with the engine — they never resolve.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use tether_engine::{ToolGate, ToolUseContext};
use tether_protocol::{
    AgentEvent, JsonMap, PermissionBehavior, PermissionResult, QuestionOption,
};

use crate::channel::PushSender;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("no pending permission with id '{0}'")]
    NoPendingPermission(String),

    #[error("no pending question with id '{0}'")]
    NoPendingQuestion(String),
}

struct PendingPermission {
    decision_tx: oneshot::Sender<PermissionResult>,
    /// Returned to the engine unchanged when the approval carries no edit.
    original_input: JsonMap,
}

/// Deferred-resolution registry for tool approvals and user questions.
///
/// The registries are lock-protected: the engine task registers entries while
/// router handlers resolve them concurrently.
pub struct PermissionGate {
    events: PushSender<AgentEvent>,
    next_permission: AtomicU64,
    next_question: AtomicU64,
    pending_permissions: Mutex<HashMap<String, PendingPermission>>,
    pending_questions: Mutex<HashMap<String, oneshot::Sender<String>>>,
}

impl PermissionGate {
    /// `events` is the session's output channel: everything the gate does is
    /// visible to stream subscribers.
    pub fn new(events: PushSender<AgentEvent>) -> Self {
        Self {
            events,
            next_permission: AtomicU64::new(1),
            next_question: AtomicU64::new(1),
            pending_permissions: Mutex::new(HashMap::new()),
            pending_questions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a pending approval and wait for its out-of-band decision.
    pub async fn request(
        &self,
        tool_name: &str,
        input: JsonMap,
        context: ToolUseContext,
    ) -> anyhow::Result<PermissionResult> {
        let id = format!(
            "perm_{}",
            self.next_permission.fetch_add(1, Ordering::Relaxed)
        );
        let (decision_tx, decision_rx) = oneshot::channel();
        self.pending_permissions
            .lock()
            .expect("permission registry lock")
            .insert(
                id.clone(),
                PendingPermission {
                    decision_tx,
                    original_input: input.clone(),
                },
            );

        debug!(%id, tool = %tool_name, "permission requested");
        self.events.push(AgentEvent::PermissionRequest {
            id: id.clone(),
            tool_name: tool_name.to_string(),
            input,
            tool_use_id: context.tool_use_id,
            reason: context.reason,
        });

        decision_rx
            .await
            .with_context(|| format!("permission '{id}' was torn down unresolved"))
    }

    /// Decide a pending permission. The resolution event is emitted before
    /// the engine is released so subscribers see it ahead of engine output.
    pub fn resolve(
        &self,
        id: &str,
        behavior: PermissionBehavior,
        updated_input: Option<JsonMap>,
    ) -> Result<(), GateError> {
        let pending = self
            .pending_permissions
            .lock()
            .expect("permission registry lock")
            .remove(id)
            .ok_or_else(|| GateError::NoPendingPermission(id.to_string()))?;

        debug!(%id, ?behavior, "permission resolved");
        self.events.push(AgentEvent::PermissionResolved {
            id: id.to_string(),
            behavior,
        });

        let result = match behavior {
            PermissionBehavior::Allow => PermissionResult::Allow {
                updated_input: updated_input.unwrap_or(pending.original_input),
            },
            PermissionBehavior::Deny => PermissionResult::Deny {
                message: "User denied".to_string(),
            },
        };
        if pending.decision_tx.send(result).is_err() {
            // The engine stopped waiting (aborted run); nothing to do.
            warn!(%id, "permission decided but the engine is gone");
        }
        Ok(())
    }

    /// Register a pending question and wait for its answer.
    pub async fn ask_question(
        &self,
        question: &str,
        options: Vec<QuestionOption>,
    ) -> anyhow::Result<String> {
        let id = format!(
            "question_{}",
            self.next_question.fetch_add(1, Ordering::Relaxed)
        );
        let (answer_tx, answer_rx) = oneshot::channel();
        self.pending_questions
            .lock()
            .expect("question registry lock")
            .insert(id.clone(), answer_tx);

        debug!(%id, "question asked");
        self.events.push(AgentEvent::UserQuestion {
            id: id.clone(),
            question: question.to_string(),
            options,
        });

        answer_rx
            .await
            .with_context(|| format!("question '{id}' was torn down unanswered"))
    }

    /// Answer a pending question.
    pub fn answer_question(&self, id: &str, answer: &str) -> Result<(), GateError> {
        let answer_tx = self
            .pending_questions
            .lock()
            .expect("question registry lock")
            .remove(id)
            .ok_or_else(|| GateError::NoPendingQuestion(id.to_string()))?;

        debug!(%id, "question answered");
        self.events.push(AgentEvent::UserQuestionAnswered {
            id: id.to_string(),
            answer: answer.to_string(),
        });
        if answer_tx.send(answer.to_string()).is_err() {
            warn!(%id, "question answered but the engine is gone");
        }
        Ok(())
    }
}

#[async_trait]
impl ToolGate for PermissionGate {
    async fn can_use_tool(
        &self,
        tool_name: &str,
        input: JsonMap,
        context: ToolUseContext,
    ) -> anyhow::Result<PermissionResult> {
        self.request(tool_name, input, context).await
    }

    async fn ask_user(
        &self,
        question: &str,
        options: Vec<QuestionOption>,
    ) -> anyhow::Result<String> {
        self.ask_question(question, options).await
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
