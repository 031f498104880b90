// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Projection of [`AgentState`] into the ordered message list the UI
//! component library renders. Purely derived data; recomputed per snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tether_protocol::{JsonMap, Role};

use crate::reducer::AgentState;

/// One renderable part of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiPart {
    Text { text: String },
    Reasoning { text: String },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        /// Finalized input, when the engine delivered it.
        #[serde(skip_serializing_if = "Option::is_none")]
        args: Option<JsonMap>,
        /// JSON text of the input: the finalized encoding when available,
        /// otherwise the raw accumulating delta text.
        #[serde(skip_serializing_if = "Option::is_none")]
        args_text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiStatus {
    Running,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiMetadata {
    pub custom: UiCustomMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiCustomMetadata {
    pub parent_tool_use_id: String,
}

/// One UI message: role, ordered parts, streaming status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiMessage {
    pub role: Role,
    pub content: Vec<UiPart>,
    pub status: UiStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<UiMetadata>,
}

/// Project the state's messages into UI shape.
///
/// Empty messages (no thinking, no text, no tool calls) are dropped. While
/// the session runs, the last surviving message is marked `running`.
pub fn convert_messages(state: &AgentState) -> Vec<UiMessage> {
    let mut out: Vec<UiMessage> = Vec::new();

    for msg in &state.messages {
        let mut content = Vec::new();
        if !msg.current_thinking.is_empty() {
            content.push(UiPart::Reasoning {
                text: msg.current_thinking.clone(),
            });
        }
        if !msg.current_text.is_empty() {
            content.push(UiPart::Text {
                text: msg.current_text.clone(),
            });
        }
        for tc in &msg.tool_calls {
            let args_text = match &tc.input {
                Some(input) => serde_json::to_string(input).ok(),
                None if !tc.input_text.is_empty() => Some(tc.input_text.clone()),
                None => None,
            };
            content.push(UiPart::ToolCall {
                tool_call_id: tc.tool_call_id.clone(),
                tool_name: tc.tool_name.clone(),
                args: tc.input.clone(),
                args_text,
                result: tc.result.clone(),
                is_error: tc.is_error,
            });
        }
        if content.is_empty() {
            continue;
        }

        out.push(UiMessage {
            role: msg.role,
            content,
            status: UiStatus::Complete,
            metadata: msg.parent_tool_use_id.as_ref().map(|id| UiMetadata {
                custom: UiCustomMetadata {
                    parent_tool_use_id: id.clone(),
                },
            }),
        });
    }

    if state.is_running {
        if let Some(last) = out.last_mut() {
            last.status = UiStatus::Running;
        }
    }
    out
}

// ── Unit tests ────────────────────────────────────────────────────────────────
