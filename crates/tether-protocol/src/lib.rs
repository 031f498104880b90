// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! The typed event protocol spoken between the tether server and its chat-UI
//! clients, plus the SSE wire codec that carries it.
//!
//! Everything here is pure data: no IO, no async. The server encodes
//! [`AgentEvent`]s onto an SSE response; the client decodes them back and
//! folds them into its view state.

pub mod event;
pub mod sse;

pub use event::{
    AgentEvent, JsonMap, PermissionBehavior, PermissionResult, QuestionOption, Role,
};
pub use sse::{decode_event, encode_done, encode_event, ProtocolError};
