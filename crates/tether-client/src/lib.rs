// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Client side of the adapter: a pure event → state fold, a projection of
//! that state into UI-shaped messages, and a runtime that owns the SSE
//! connection and the HTTP calls.
//!
//! The fold and the projection are deliberately free of IO so a UI layer can
//! drive them from recorded event logs in tests.

pub mod reducer;
pub mod runtime;
pub mod ui;

pub use reducer::{
    apply_event, AgentMessage, AgentState, PendingPermission, PendingQuestion, ToolCallInfo,
};
pub use runtime::ChatClient;
pub use ui::{convert_messages, UiMessage, UiMetadata, UiPart, UiStatus};
