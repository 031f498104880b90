// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! SSE wire codec.
//!
//! Each event is the literal bytes `data: ` + single-line JSON + `\n\n`.
//! The stream terminates with `data: [DONE]\n\n`. The server only encodes;
//! the client only decodes — both halves live here so the round-trip law
//! (`decode(trim(encode(e))) == e`) is tested in one place.

use thiserror::Error;

use crate::event::AgentEvent;

/// Sentinel payload that marks the end of an SSE stream.
pub const DONE_PAYLOAD: &str = "[DONE]";

const DATA_PREFIX: &str = "data: ";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("SSE line is missing the 'data: ' prefix")]
    MissingPrefix,

    #[error("malformed event JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode one event as an SSE frame.
pub fn encode_event(ev: &AgentEvent) -> Result<String, ProtocolError> {
    let json = serde_json::to_string(ev)?;
    Ok(format!("{DATA_PREFIX}{json}\n\n"))
}

/// The stream terminator frame.
pub fn encode_done() -> String {
    format!("{DATA_PREFIX}{DONE_PAYLOAD}\n\n")
}

/// Decode one SSE line (without its trailing blank line).
///
/// Returns `Ok(None)` when the payload is the `[DONE]` terminator.
pub fn decode_event(line: &str) -> Result<Option<AgentEvent>, ProtocolError> {
    let payload = line
        .trim()
        .strip_prefix(DATA_PREFIX)
        .ok_or(ProtocolError::MissingPrefix)?
        .trim();
    if payload == DONE_PAYLOAD {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(payload)?))
}

// ── Unit tests ────────────────────────────────────────────────────────────────
