// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! NDJSON subprocess engine.
//!
//! Spawns a configured command and speaks newline-delimited JSON with it:
//! each prompt message goes to the child's stdin as one line, each stdout
//! line that parses as a JSON object comes back as an engine message. Lines
//! that are not JSON objects (banners, stray prints) are skipped with a
//! warning. Abort kills the child; the message stream then ends.
//!
//! Engines run this way do their own tool approval inside the child process,
//! so the permission handler is never called from this backend.

use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use crate::contract::{aborted, Engine, EngineHandle, EngineInvocation, QueryRequest};

/// Engine backend driving an external NDJSON-speaking process.
pub struct ProcessEngine {
    command: Vec<String>,
}

impl ProcessEngine {
    /// `command[0]` is the program, the rest its arguments.
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Engine for ProcessEngine {
    async fn query(&self, request: QueryRequest) -> anyhow::Result<EngineInvocation> {
        let program = self
            .command
            .first()
            .context("engine command must not be empty")?;

        let mut child = Command::new(program)
            .args(&self.command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning engine process '{program}'"))?;

        let mut stdin = child.stdin.take().context("engine process has no stdin")?;
        let stdout = child.stdout.take().context("engine process has no stdout")?;
        debug!(%program, pid = ?child.id(), "engine process started");

        let handle = EngineHandle::new();
        let mut signal = handle.subscribe();

        // Forward prompt turns to the child. When the prompt closes, closing
        // stdin lets a well-behaved engine finish its run and exit.
        let mut prompt = request.prompt;
        tokio::spawn(async move {
            while let Some(msg) = prompt.next().await {
                let mut line = msg.to_string();
                line.push('\n');
                if stdin.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<anyhow::Result<Value>>();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => match line {
                        Ok(Some(raw)) => {
                            let raw = raw.trim();
                            if raw.is_empty() {
                                continue;
                            }
                            match serde_json::from_str::<Value>(raw) {
                                Ok(v) if v.is_object() => {
                                    if tx.send(Ok(v)).is_err() {
                                        break;
                                    }
                                }
                                _ => warn!("skipping non-JSON engine output line"),
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = tx.send(Err(anyhow::anyhow!("engine stdout read: {e}")));
                            break;
                        }
                    },
                    () = aborted(&mut signal) => {
                        if let Err(e) = child.kill().await {
                            warn!("killing engine process: {e}");
                        }
                        break;
                    }
                }
            }
            debug!("engine process stream closed");
        });

        Ok(EngineInvocation {
            messages: Box::pin(UnboundedReceiverStream::new(rx)),
            handle,
        })
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
