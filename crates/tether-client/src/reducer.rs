// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Pure event → state fold.
//!
//! The reducer mirrors the server's event semantics exactly; it has to,
//! because it is the only place the streamed protocol turns back into
//! something renderable. The defensive rules matter: engines emit overlapping
//! encodings and events can reference tool calls from earlier turns, so
//! `tool_result` searches messages newest-first while `tool_call` /
//! `tool_input_delta` only ever touch the current message, and unmatched
//! references are dropped rather than invented.

use serde_json::Value;

use tether_protocol::{AgentEvent, JsonMap, QuestionOption, Role};

/// One tool invocation as the client sees it accumulate.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallInfo {
    pub tool_call_id: String,
    pub tool_name: String,
    /// Raw partial JSON accumulated from `tool_input_delta`s.
    pub input_text: String,
    /// Finalized decoded input; arrives independently of the deltas.
    pub input: Option<JsonMap>,
    pub result: Option<Value>,
    pub is_error: Option<bool>,
}

impl ToolCallInfo {
    fn new(tool_call_id: String, tool_name: String) -> Self {
        Self {
            tool_call_id,
            tool_name,
            input_text: String::new(),
            input: None,
            result: None,
            is_error: None,
        }
    }
}

/// One assistant message being streamed or completed.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentMessage {
    pub role: Role,
    pub parent_tool_use_id: Option<String>,
    pub current_text: String,
    pub current_thinking: String,
    /// Insertion-ordered; looked up by id.
    pub tool_calls: Vec<ToolCallInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingPermission {
    pub id: String,
    pub tool_name: String,
    pub input: JsonMap,
    pub tool_use_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<QuestionOption>,
}

/// The whole client view of one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentState {
    pub session_id: Option<String>,
    pub is_running: bool,
    pub messages: Vec<AgentMessage>,
    /// Append-on-request, delete-on-resolve; insertion order preserved.
    pub pending_permissions: Vec<PendingPermission>,
    pub pending_questions: Vec<PendingQuestion>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Fold one event into the state.
pub fn apply_event(state: &mut AgentState, event: &AgentEvent) {
    match event {
        AgentEvent::SessionInit { session_id } => {
            // A new session replaces the state wholesale.
            *state = AgentState {
                session_id: Some(session_id.clone()),
                is_running: true,
                ..AgentState::default()
            };
        }

        AgentEvent::MessageStart {
            role,
            parent_tool_use_id,
        } => {
            state.messages.push(AgentMessage {
                role: *role,
                parent_tool_use_id: parent_tool_use_id.clone(),
                current_text: String::new(),
                current_thinking: String::new(),
                tool_calls: Vec::new(),
            });
        }

        AgentEvent::TextDelta { text } => {
            if let Some(msg) = state.messages.last_mut() {
                msg.current_text.push_str(text);
            }
        }

        AgentEvent::ThinkingDelta { text } => {
            if let Some(msg) = state.messages.last_mut() {
                msg.current_thinking.push_str(text);
            }
        }

        AgentEvent::ToolStart {
            tool_call_id,
            tool_name,
        } => {
            if let Some(msg) = state.messages.last_mut() {
                msg.tool_calls
                    .push(ToolCallInfo::new(tool_call_id.clone(), tool_name.clone()));
            }
        }

        AgentEvent::ToolInputDelta { tool_call_id, text } => {
            if let Some(tc) = current_tool_call(state, tool_call_id) {
                tc.input_text.push_str(text);
            }
        }

        AgentEvent::ToolCall {
            tool_call_id,
            tool_name,
            input,
        } => {
            if let Some(tc) = current_tool_call(state, tool_call_id) {
                tc.tool_name = tool_name.clone();
                tc.input = Some(input.clone());
            }
        }

        AgentEvent::ToolResult {
            tool_call_id,
            result,
            is_error,
        } => {
            // The result may arrive a message later (e.g. after a subagent
            // turn); find the owning message newest-first.
            for msg in state.messages.iter_mut().rev() {
                if let Some(tc) = msg
                    .tool_calls
                    .iter_mut()
                    .find(|tc| tc.tool_call_id == *tool_call_id)
                {
                    tc.result = Some(result.clone());
                    tc.is_error = *is_error;
                    break;
                }
            }
        }

        AgentEvent::PermissionRequest {
            id,
            tool_name,
            input,
            tool_use_id,
            reason,
        } => {
            state.pending_permissions.push(PendingPermission {
                id: id.clone(),
                tool_name: tool_name.clone(),
                input: input.clone(),
                tool_use_id: tool_use_id.clone(),
                reason: reason.clone(),
            });
        }

        AgentEvent::PermissionResolved { id, .. } => {
            state.pending_permissions.retain(|p| p.id != *id);
        }

        AgentEvent::UserQuestion {
            id,
            question,
            options,
        } => {
            state.pending_questions.push(PendingQuestion {
                id: id.clone(),
                question: question.clone(),
                options: options.clone(),
            });
        }

        AgentEvent::UserQuestionAnswered { id, .. } => {
            state.pending_questions.retain(|q| q.id != *id);
        }

        AgentEvent::Result { result } => {
            state.is_running = false;
            state.result = result.clone();
        }

        AgentEvent::Error { message } => {
            state.is_running = false;
            state.error = Some(message.clone());
        }
    }
}

/// A tool call may only be mutated while its message is the latest one.
fn current_tool_call<'a>(
    state: &'a mut AgentState,
    tool_call_id: &str,
) -> Option<&'a mut ToolCallInfo> {
    state
        .messages
        .last_mut()?
        .tool_calls
        .iter_mut()
        .find(|tc| tc.tool_call_id == tool_call_id)
}

// ── Unit tests ────────────────────────────────────────────────────────────────
