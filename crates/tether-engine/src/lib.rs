// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The engine side of the adapter: the contract an upstream agent engine must
//! satisfy, typed decoding of its message shapes, and two backends — a
//! scripted in-process engine for tests and an NDJSON subprocess engine.
//!
//! The engine is deliberately opaque to the rest of the workspace: a session
//! hands it a prompt stream and a permission handler, and gets back a message
//! stream plus an interrupt/abort handle. Nothing downstream of this crate
//! knows which backend is running.

pub mod contract;
pub mod message;
pub mod mock;
pub mod process;

pub use contract::{
    aborted, user_message, Engine, EngineHandle, EngineInvocation, EngineSignal, MessageStream,
    PromptStream, QueryRequest, ToolGate, ToolUseContext,
};
pub use message::{tool_result_text, ContentBlock, EngineMessage, StreamEvent};
pub use mock::{EchoEngine, ScriptStep, ScriptedEngine};
pub use process::ProcessEngine;
