// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The heart of the adapter: per-conversation sessions that multiplex user
//! turns and normalized events against a single long-running engine
//! invocation.
//!
//! ```text
//!   POST /sessions ──► SessionManager::create
//!                           │
//!                           ▼
//!   ┌────────────────────── Session ──────────────────────┐
//!   │  input channel ──► engine.query(prompt, gate)       │
//!   │                        │                            │
//!   │                        ▼ engine messages            │
//!   │  driver task ──► Translator ──► output channel ──►──┼──► SSE responder
//!   │                                      ▲              │
//!   │  PermissionGate ── emits ────────────┘              │
//!   └─────────────────────────────────────────────────────┘
//! ```

pub mod channel;
pub mod gate;
pub mod session;
pub mod translate;

pub use channel::{push_channel, PushReceiver, PushSender};
pub use gate::{GateError, PermissionGate};
pub use session::{Session, SessionManager};
pub use translate::Translator;
