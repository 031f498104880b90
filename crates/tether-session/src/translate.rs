// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Stream translator — folds the engine's irregular message stream into a
//! linear, non-redundant [`AgentEvent`] stream.
//!
//! The engine interleaves two partially-overlapping encodings of the same
//! content: low-level streaming deltas, and aggregated blocks repeated on the
//! completed message. The translator keeps the useful union — text, thinking,
//! and tool-input as they stream, plus the finalized structured tool input
//! and the tool results. The `had_stream_thinking` flag suppresses the
//! aggregated thinking block whenever its deltas already streamed, so
//! thinking is never emitted twice.
//!
//! The translator is single-threaded by construction: only the session's
//! driver task calls `translate`, so no lock is needed around its state.

use serde_json::Value;
use tether_engine::{tool_result_text, ContentBlock, EngineMessage, StreamEvent};
use tether_protocol::{AgentEvent, Role};

/// Stateful per-session reducer: one engine message in, zero or more events out.
pub struct Translator {
    /// Every tool introduced this session, in introduction order.
    /// `input_json_delta` events carry no id, so they are attributed to the
    /// most recently introduced tool.
    tools: Vec<(String, String)>,
    /// Whether any thinking delta streamed since the last `message_start`.
    had_stream_thinking: bool,
}

impl Translator {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            had_stream_thinking: false,
        }
    }

    pub fn translate(&mut self, raw: &Value) -> Vec<AgentEvent> {
        match EngineMessage::parse(raw) {
            EngineMessage::Stream {
                event,
                parent_tool_use_id,
            } => self.on_stream_event(event, parent_tool_use_id),
            EngineMessage::Assistant { content, .. } => self.on_assistant(content),
            EngineMessage::User { content } => on_user(content),
            EngineMessage::Init { session_id } => vec![AgentEvent::SessionInit { session_id }],
            EngineMessage::Result { subtype, result } => {
                if subtype.as_deref() == Some("success") {
                    vec![AgentEvent::Result { result }]
                } else {
                    vec![AgentEvent::Error {
                        message: subtype.unwrap_or_else(|| "unknown_error".to_string()),
                    }]
                }
            }
            EngineMessage::Other => Vec::new(),
        }
    }

    fn on_stream_event(
        &mut self,
        event: StreamEvent,
        parent_tool_use_id: Option<String>,
    ) -> Vec<AgentEvent> {
        match event {
            StreamEvent::MessageStart => {
                self.had_stream_thinking = false;
                vec![AgentEvent::MessageStart {
                    role: Role::Assistant,
                    parent_tool_use_id,
                }]
            }
            StreamEvent::BlockStart(ContentBlock::ToolUse { id, name, .. }) => {
                self.record_tool(&id, &name);
                vec![AgentEvent::ToolStart {
                    tool_call_id: id,
                    tool_name: name,
                }]
            }
            StreamEvent::TextDelta(text) => vec![AgentEvent::TextDelta { text }],
            StreamEvent::ThinkingDelta(text) => {
                self.had_stream_thinking = true;
                vec![AgentEvent::ThinkingDelta { text }]
            }
            StreamEvent::InputJsonDelta(text) => match self.tools.last() {
                Some((id, _)) => vec![AgentEvent::ToolInputDelta {
                    tool_call_id: id.clone(),
                    text,
                }],
                // Input deltas before any tool was introduced have nowhere to
                // go; drop them rather than invent an attribution.
                None => Vec::new(),
            },
            StreamEvent::BlockStart(_) | StreamEvent::Other => Vec::new(),
        }
    }

    fn on_assistant(&mut self, content: Vec<ContentBlock>) -> Vec<AgentEvent> {
        let mut out = Vec::new();
        for block in content {
            match block {
                ContentBlock::Thinking { thinking } => {
                    // The aggregated block is redundant when its deltas
                    // already streamed this turn.
                    if !self.had_stream_thinking {
                        out.push(AgentEvent::ThinkingDelta { text: thinking });
                    }
                }
                ContentBlock::ToolUse { id, name, input } => {
                    self.record_tool(&id, &name);
                    out.push(AgentEvent::ToolCall {
                        tool_call_id: id,
                        tool_name: name,
                        input,
                    });
                }
                // Text blocks are fully covered by streaming deltas.
                ContentBlock::Text { .. }
                | ContentBlock::ToolResult { .. }
                | ContentBlock::Other => {}
            }
        }
        out
    }

    fn record_tool(&mut self, id: &str, name: &str) {
        match self.tools.iter_mut().find(|(tid, _)| tid == id) {
            Some((_, existing)) => *existing = name.to_string(),
            None => self.tools.push((id.to_string(), name.to_string())),
        }
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

fn on_user(content: Vec<ContentBlock>) -> Vec<AgentEvent> {
    content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
            } => Some(AgentEvent::ToolResult {
                tool_call_id: tool_use_id,
                result: Value::String(tool_result_text(&content)),
                is_error: None,
            }),
            _ => None,
        })
        .collect()
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn stream_event(event: Value) -> Value {
        json!({ "type": "stream_event", "event": event })
    }

    fn text_delta(text: &str) -> Value {
        stream_event(json!({
            "type": "content_block_delta",
            "delta": { "type": "text_delta", "text": text },
        }))
    }

    fn thinking_delta(text: &str) -> Value {
        stream_event(json!({
            "type": "content_block_delta",
            "delta": { "type": "thinking_delta", "thinking": text },
        }))
    }

    fn message_start() -> Value {
        stream_event(json!({ "type": "message_start" }))
    }

    #[test]
    fn text_streaming_turn() {
        let mut t = Translator::new();
        let mut events = Vec::new();
        events.extend(t.translate(&json!({
            "type": "system", "subtype": "init", "session_id": "int-1",
        })));
        events.extend(t.translate(&message_start()));
        events.extend(t.translate(&text_delta("Hello ")));
        events.extend(t.translate(&text_delta("world!")));
        events.extend(t.translate(&json!({ "type": "assistant", "message": { "content": [] } })));
        events.extend(t.translate(&json!({ "type": "result", "subtype": "success" })));

        assert_eq!(
            events,
            vec![
                AgentEvent::SessionInit {
                    session_id: "int-1".into()
                },
                AgentEvent::MessageStart {
                    role: Role::Assistant,
                    parent_tool_use_id: None
                },
                AgentEvent::TextDelta {
                    text: "Hello ".into()
                },
                AgentEvent::TextDelta {
                    text: "world!".into()
                },
                AgentEvent::Result { result: None },
            ]
        );
    }

    #[test]
    fn tool_call_lifecycle() {
        let mut t = Translator::new();

        let started = t.translate(&stream_event(json!({
            "type": "content_block_start",
            "content_block": { "type": "tool_use", "id": "tc-1", "name": "Read", "input": {} },
        })));
        assert_eq!(
            started,
            vec![AgentEvent::ToolStart {
                tool_call_id: "tc-1".into(),
                tool_name: "Read".into()
            }]
        );

        let delta = t.translate(&stream_event(json!({
            "type": "content_block_delta",
            "delta": { "type": "input_json_delta", "partial_json": "{\"file_path\":\"/tmp/test.ts\"}" },
        })));
        assert_eq!(
            delta,
            vec![AgentEvent::ToolInputDelta {
                tool_call_id: "tc-1".into(),
                text: "{\"file_path\":\"/tmp/test.ts\"}".into()
            }]
        );

        let finalized = t.translate(&json!({
            "type": "assistant",
            "message": { "content": [
                { "type": "tool_use", "id": "tc-1", "name": "Read",
                  "input": { "file_path": "/tmp/test.ts" } },
            ] },
        }));
        match &finalized[..] {
            [AgentEvent::ToolCall {
                tool_call_id,
                tool_name,
                input,
            }] => {
                assert_eq!(tool_call_id, "tc-1");
                assert_eq!(tool_name, "Read");
                assert_eq!(input["file_path"], "/tmp/test.ts");
            }
            other => panic!("unexpected events: {other:?}"),
        }

        let result = t.translate(&json!({
            "type": "user",
            "message": { "content": [
                { "type": "tool_result", "tool_use_id": "tc-1", "content": "const x = 42;" },
            ] },
        }));
        assert_eq!(
            result,
            vec![AgentEvent::ToolResult {
                tool_call_id: "tc-1".into(),
                result: json!("const x = 42;"),
                is_error: None,
            }]
        );
    }

    #[test]
    fn input_json_delta_attributes_to_most_recent_tool() {
        let mut t = Translator::new();
        for (id, name) in [("tc-1", "Read"), ("tc-2", "Bash")] {
            t.translate(&stream_event(json!({
                "type": "content_block_start",
                "content_block": { "type": "tool_use", "id": id, "name": name, "input": {} },
            })));
        }
        let events = t.translate(&stream_event(json!({
            "type": "content_block_delta",
            "delta": { "type": "input_json_delta", "partial_json": "{}" },
        })));
        assert_eq!(
            events,
            vec![AgentEvent::ToolInputDelta {
                tool_call_id: "tc-2".into(),
                text: "{}".into()
            }]
        );
    }

    #[test]
    fn input_json_delta_without_any_tool_is_dropped() {
        let mut t = Translator::new();
        let events = t.translate(&stream_event(json!({
            "type": "content_block_delta",
            "delta": { "type": "input_json_delta", "partial_json": "{}" },
        })));
        assert!(events.is_empty());
    }

    #[test]
    fn streamed_thinking_suppresses_the_aggregated_block() {
        let mut t = Translator::new();
        t.translate(&message_start());
        let streamed = t.translate(&thinking_delta("stream thought"));
        assert_eq!(
            streamed,
            vec![AgentEvent::ThinkingDelta {
                text: "stream thought".into()
            }]
        );

        // The aggregated assistant message repeats the thinking and adds a
        // text block; both are redundant here.
        let aggregated = t.translate(&json!({
            "type": "assistant",
            "message": { "content": [
                { "type": "thinking", "thinking": "stream thought" },
                { "type": "text", "text": "response" },
            ] },
        }));
        assert!(aggregated.is_empty());
    }

    #[test]
    fn message_start_resets_the_thinking_gate() {
        let mut t = Translator::new();
        t.translate(&message_start());
        t.translate(&thinking_delta("first turn"));
        t.translate(&json!({
            "type": "assistant",
            "message": { "content": [{ "type": "thinking", "thinking": "first turn" }] },
        }));

        // Second turn: no streamed thinking, so the aggregated block counts.
        t.translate(&message_start());
        let events = t.translate(&json!({
            "type": "assistant",
            "message": { "content": [{ "type": "thinking", "thinking": "second turn thought" }] },
        }));
        assert_eq!(
            events,
            vec![AgentEvent::ThinkingDelta {
                text: "second turn thought".into()
            }]
        );
    }

    #[test]
    fn non_success_result_becomes_error() {
        let mut t = Translator::new();
        let events = t.translate(&json!({ "type": "result", "subtype": "error_max_turns" }));
        assert_eq!(
            events,
            vec![AgentEvent::Error {
                message: "error_max_turns".into()
            }]
        );

        let events = t.translate(&json!({ "type": "result" }));
        assert_eq!(
            events,
            vec![AgentEvent::Error {
                message: "unknown_error".into()
            }]
        );
    }

    #[test]
    fn unknown_message_types_produce_nothing() {
        let mut t = Translator::new();
        assert!(t.translate(&json!({ "type": "telemetry" })).is_empty());
        assert!(t.translate(&json!({})).is_empty());
        assert!(t
            .translate(&json!({ "type": "system", "subtype": "status" }))
            .is_empty());
    }

    #[test]
    fn subagent_message_start_carries_parent_id() {
        let mut t = Translator::new();
        let events = t.translate(&json!({
            "type": "stream_event",
            "event": { "type": "message_start" },
            "parent_tool_use_id": "tc-parent",
        }));
        assert_eq!(
            events,
            vec![AgentEvent::MessageStart {
                role: Role::Assistant,
                parent_tool_use_id: Some("tc-parent".into()),
            }]
        );
    }
}
