// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Typed decoding of the engine's heterogeneous message shapes.
//!
//! Engines emit loosely-structured JSON with a `type` discriminator. Decoding
//! happens once, at the translator's edge; everything the adapter does not
//! recognize collapses into `Other` and produces no events. All field access
//! is defensive — a missing or oddly-typed field never fails a parse, it just
//! degrades to the neutral value.

use serde_json::Value;

use tether_protocol::JsonMap;

/// One decoded engine message.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// A low-level streaming event, wrapped with the subagent attribution
    /// carried on the outer message.
    Stream {
        event: StreamEvent,
        parent_tool_use_id: Option<String>,
    },
    /// A complete assistant message with aggregated content blocks.
    Assistant {
        content: Vec<ContentBlock>,
        parent_tool_use_id: Option<String>,
    },
    /// A user-side message; carries tool results back to the conversation.
    User { content: Vec<ContentBlock> },
    /// The engine announced its session identity.
    Init { session_id: String },
    /// The run finished; `subtype == "success"` means cleanly.
    Result {
        subtype: Option<String>,
        result: Option<Value>,
    },
    /// Anything the adapter does not recognize.
    Other,
}

/// The inner event of a `stream_event` message.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    MessageStart,
    BlockStart(ContentBlock),
    TextDelta(String),
    ThinkingDelta(String),
    InputJsonDelta(String),
    Other,
}

/// One content block of an aggregated assistant or user message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// `tool_use` and `server_tool_use` are not distinguished downstream.
    ToolUse {
        id: String,
        name: String,
        input: JsonMap,
    },
    Thinking { thinking: String },
    Text { text: String },
    ToolResult { tool_use_id: String, content: Value },
    Other,
}

impl EngineMessage {
    pub fn parse(v: &Value) -> EngineMessage {
        match v["type"].as_str().unwrap_or("") {
            "stream_event" => EngineMessage::Stream {
                event: StreamEvent::parse(&v["event"]),
                parent_tool_use_id: opt_string(&v["parent_tool_use_id"]),
            },
            "assistant" => EngineMessage::Assistant {
                content: parse_blocks(message_content(v)),
                parent_tool_use_id: opt_string(&v["parent_tool_use_id"]),
            },
            "user" => EngineMessage::User {
                content: parse_blocks(message_content(v)),
            },
            "system" => {
                if v["subtype"].as_str() == Some("init") {
                    match v["session_id"].as_str() {
                        Some(id) => EngineMessage::Init {
                            session_id: id.to_string(),
                        },
                        None => EngineMessage::Other,
                    }
                } else {
                    EngineMessage::Other
                }
            }
            "result" => EngineMessage::Result {
                subtype: opt_string(&v["subtype"]),
                result: match &v["result"] {
                    Value::Null => None,
                    other => Some(other.clone()),
                },
            },
            _ => EngineMessage::Other,
        }
    }
}

impl StreamEvent {
    pub fn parse(v: &Value) -> StreamEvent {
        match v["type"].as_str().unwrap_or("") {
            "message_start" => StreamEvent::MessageStart,
            "content_block_start" => StreamEvent::BlockStart(ContentBlock::parse(&v["content_block"])),
            "content_block_delta" => {
                let delta = &v["delta"];
                match delta["type"].as_str().unwrap_or("") {
                    "text_delta" => {
                        StreamEvent::TextDelta(delta["text"].as_str().unwrap_or("").to_string())
                    }
                    "thinking_delta" => StreamEvent::ThinkingDelta(
                        delta["thinking"].as_str().unwrap_or("").to_string(),
                    ),
                    "input_json_delta" => StreamEvent::InputJsonDelta(
                        delta["partial_json"].as_str().unwrap_or("").to_string(),
                    ),
                    _ => StreamEvent::Other,
                }
            }
            _ => StreamEvent::Other,
        }
    }
}

impl ContentBlock {
    pub fn parse(v: &Value) -> ContentBlock {
        match v["type"].as_str().unwrap_or("") {
            "tool_use" | "server_tool_use" => ContentBlock::ToolUse {
                id: v["id"].as_str().unwrap_or("").to_string(),
                name: v["name"].as_str().unwrap_or("").to_string(),
                input: v["input"].as_object().cloned().unwrap_or_default(),
            },
            "thinking" => ContentBlock::Thinking {
                thinking: v["thinking"].as_str().unwrap_or("").to_string(),
            },
            "text" => ContentBlock::Text {
                text: v["text"].as_str().unwrap_or("").to_string(),
            },
            "tool_result" => ContentBlock::ToolResult {
                tool_use_id: v["tool_use_id"].as_str().unwrap_or("").to_string(),
                content: v["content"].clone(),
            },
            _ => ContentBlock::Other,
        }
    }
}

/// Aggregated messages nest their blocks under `message.content`; some engine
/// builds put the array at the top level. Accept either.
fn message_content(v: &Value) -> &Value {
    let nested = &v["message"]["content"];
    if nested.is_array() {
        nested
    } else {
        &v["content"]
    }
}

fn parse_blocks(v: &Value) -> Vec<ContentBlock> {
    v.as_array()
        .map(|blocks| blocks.iter().map(ContentBlock::parse).collect())
        .unwrap_or_default()
}

fn opt_string(v: &Value) -> Option<String> {
    v.as_str().map(str::to_string)
}

/// Flatten a `tool_result` block's content into display text.
///
/// Strings pass through; arrays contribute the concatenated `text` fields of
/// their `text`-typed sub-blocks, or their JSON encoding when no such
/// sub-block exists; anything else is the empty string.
pub fn tool_result_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let texts: Vec<&str> = items
                .iter()
                .filter(|b| b["type"].as_str() == Some("text"))
                .filter_map(|b| b["text"].as_str())
                .collect();
            if texts.is_empty() {
                serde_json::to_string(items).unwrap_or_default()
            } else {
                texts.concat()
            }
        }
        _ => String::new(),
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
