// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Wire protocol between the tether server and chat-UI clients.
//!
//! All types derive `Serialize`/`Deserialize` and are encoded as JSON with a
//! snake_case `type` discriminator and camelCase fields — the shape the
//! browser-side message components consume directly.
//!
//! # Typical session flow
//!
//! ```text
//! UI                                 Server / Engine
//!  │                                     │
//!  │── POST /sessions {message} ────────►│  session created
//!  │── GET /sessions/:id/events ────────►│  SSE stream opens
//!  │◄─ session_init {sessionId} ─────────│
//!  │◄─ message_start ────────────────────│
//!  │◄─ text_delta × N ───────────────────│
//!  │◄─ tool_start / tool_input_delta ────│  (if a tool is called)
//!  │◄─ permission_request {id} ──────────│  (if the tool needs approval)
//!  │── POST …/respond {kind,id,allow} ──►│
//!  │◄─ permission_resolved {id} ─────────│  engine resumes
//!  │◄─ tool_call / tool_result ──────────│
//!  │◄─ result ───────────────────────────│
//!  │◄─ data: [DONE] ─────────────────────│  stream closes
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decoded JSON object — tool inputs are free-form maps on the wire.
pub type JsonMap = serde_json::Map<String, Value>;

/// Message author role as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Assistant,
    User,
}

/// One selectable option of a [`AgentEvent::UserQuestion`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl QuestionOption {
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: Some(description.into()),
        }
    }
}

/// How a pending permission was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionBehavior {
    Allow,
    Deny,
}

/// The decision handed back to the engine's tool-gate callback.
///
/// This is the exact shape the engine contract expects: `allow` carries the
/// (possibly operator-edited) tool input the engine should proceed with,
/// `deny` carries a human-readable refusal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "behavior", rename_all = "snake_case")]
pub enum PermissionResult {
    #[serde(rename_all = "camelCase")]
    Allow { updated_input: JsonMap },
    Deny { message: String },
}

/// Events emitted by the adapter and streamed to all session subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The engine announced its session identity.
    #[serde(rename_all = "camelCase")]
    SessionInit { session_id: String },

    /// A new assistant message begins; deltas that follow belong to it.
    #[serde(rename_all = "camelCase")]
    MessageStart {
        role: Role,
        /// Set when the message was emitted from within a parent tool call
        /// (subagent output).
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
    },

    /// A streaming text chunk of the current assistant message.
    TextDelta { text: String },

    /// A streaming chunk of the model's reasoning.
    ThinkingDelta { text: String },

    /// The model started composing a tool call.
    #[serde(rename_all = "camelCase")]
    ToolStart {
        tool_call_id: String,
        tool_name: String,
    },

    /// Partial JSON accumulating the tool input.
    #[serde(rename_all = "camelCase")]
    ToolInputDelta { tool_call_id: String, text: String },

    /// The tool input is complete, decoded into a map.
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        input: JsonMap,
    },

    /// A tool finished; `result` may be any JSON value.
    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_call_id: String,
        result: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },

    /// The engine is waiting for the user to approve a tool call.
    #[serde(rename_all = "camelCase")]
    PermissionRequest {
        id: String,
        tool_name: String,
        input: JsonMap,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// A pending permission was decided (by this client or another).
    PermissionResolved {
        id: String,
        behavior: PermissionBehavior,
    },

    /// The engine is asking the user a multiple-choice question.
    UserQuestion {
        id: String,
        question: String,
        options: Vec<QuestionOption>,
    },

    /// A pending question was answered.
    UserQuestionAnswered { id: String, answer: String },

    /// The engine run completed successfully.
    Result {
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },

    /// The engine run failed; the stream ends after this.
    Error { message: String },
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_tag_is_snake_case() {
        let ev = AgentEvent::SessionInit {
            session_id: "s-1".into(),
        };
        let v: Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "session_init");
        assert_eq!(v["sessionId"], "s-1");
    }

    #[test]
    fn fields_are_camel_case() {
        let ev = AgentEvent::ToolStart {
            tool_call_id: "tc-1".into(),
            tool_name: "Read".into(),
        };
        let v: Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["toolCallId"], "tc-1");
        assert_eq!(v["toolName"], "Read");
    }

    #[test]
    fn absent_optional_fields_are_omitted() {
        let ev = AgentEvent::MessageStart {
            role: Role::Assistant,
            parent_tool_use_id: None,
        };
        let v: Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["role"], "assistant");
        assert!(v.get("parentToolUseId").is_none());

        let ev = AgentEvent::PermissionRequest {
            id: "perm_1".into(),
            tool_name: "Bash".into(),
            input: JsonMap::new(),
            tool_use_id: None,
            reason: None,
        };
        let v: Value = serde_json::to_value(&ev).unwrap();
        assert!(v.get("toolUseId").is_none());
        assert!(v.get("reason").is_none());
    }

    #[test]
    fn permission_result_allow_carries_updated_input() {
        let mut input = JsonMap::new();
        input.insert("command".into(), json!("ls"));
        let res = PermissionResult::Allow {
            updated_input: input,
        };
        let v: Value = serde_json::to_value(&res).unwrap();
        assert_eq!(v["behavior"], "allow");
        assert_eq!(v["updatedInput"]["command"], "ls");
    }

    #[test]
    fn permission_result_deny_carries_message() {
        let res = PermissionResult::Deny {
            message: "User denied".into(),
        };
        let v: Value = serde_json::to_value(&res).unwrap();
        assert_eq!(v["behavior"], "deny");
        assert_eq!(v["message"], "User denied");
    }
}
