// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Push channel — an async FIFO with explicit close semantics.
//!
//! A session uses two of these: one carrying user turns into the engine and
//! one carrying normalized events out to the SSE responder. The deliberate
//! quirk, and the reason this is not a bare mpsc channel, is the close
//! behavior: `push` after `close` is silently discarded (not an error), and
//! `close` is idempotent from any sender clone. Consumption terminates once
//! the queue is drained and the channel is closed.
//!
//! Delivery is in push order. There is no internal bound — producers are
//! trusted not to flood. The single consumer holds the receiver exclusively,
//! so at most one task is ever parked waiting for a value.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Create a connected sender/receiver pair.
pub fn push_channel<T>() -> (PushSender<T>, PushReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        PushSender {
            shared: Arc::new(Shared {
                tx: Mutex::new(Some(tx)),
            }),
        },
        PushReceiver { rx },
    )
}

struct Shared<T> {
    /// `None` once the channel is closed; dropping the inner sender is what
    /// terminates the receiver after the queue drains.
    tx: Mutex<Option<mpsc::UnboundedSender<T>>>,
}

/// Producer half. Cloneable — the driver and the permission gate both push
/// onto a session's output channel, and closing through any clone closes all.
pub struct PushSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for PushSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> PushSender<T> {
    /// Enqueue a value, waking a parked consumer. No-op after close.
    pub fn push(&self, value: T) {
        if let Some(tx) = &*self.shared.tx.lock().expect("push channel lock") {
            // The receiver being gone is equivalent to a closed channel.
            let _ = tx.send(value);
        }
    }

    /// Close the channel. Idempotent; a parked consumer observes end-of-stream
    /// once the queue is drained.
    pub fn close(&self) {
        self.shared.tx.lock().expect("push channel lock").take();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.tx.lock().expect("push channel lock").is_none()
    }
}

/// Consumer half. Exactly one exists per channel.
pub struct PushReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> PushReceiver<T> {
    /// Next value in push order; `None` once the channel is closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Adapt into a `Stream` for composition with engine iterators.
    pub fn into_stream(self) -> UnboundedReceiverStream<T> {
        UnboundedReceiverStream::new(self.rx)
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
