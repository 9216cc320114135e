//! Per-connection outbound path.
//!
//! Direct replies go through a bounded queue. Host transforms go through a
//! single-value slot, so a Guest that falls behind only ever has the newest
//! transform pending.

use std::sync::Arc;

use organtrack_protocol::ServerMessage;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

/// Replies a connection may have pending before new ones are dropped
pub const OUTBOUND_CAPACITY: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutboxError {
    #[error("outbound queue full")]
    Full,

    #[error("connection closed")]
    Closed,
}

/// Sending half, cloned into the registry for every session of a connection
#[derive(Debug, Clone)]
pub struct Outbox {
    replies: mpsc::Sender<ServerMessage>,
    transform: Arc<watch::Sender<Option<ServerMessage>>>,
}

/// Receiving half, drained by the connection's writer task
#[derive(Debug)]
pub struct Inbox {
    replies: mpsc::Receiver<ServerMessage>,
    transform: watch::Receiver<Option<ServerMessage>>,
}

pub fn outbox(capacity: usize) -> (Outbox, Inbox) {
    let (replies_tx, replies_rx) = mpsc::channel(capacity);
    let (transform_tx, transform_rx) = watch::channel(None);
    (
        Outbox {
            replies: replies_tx,
            transform: Arc::new(transform_tx),
        },
        Inbox {
            replies: replies_rx,
            transform: transform_rx,
        },
    )
}

impl Outbox {
    /// Queue a message without waiting.
    ///
    /// A transform replaces any transform not yet written.
    pub fn send(&self, message: ServerMessage) -> Result<(), OutboxError> {
        if matches!(message, ServerMessage::Transform { .. }) {
            return self
                .transform
                .send(Some(message))
                .map_err(|_| OutboxError::Closed);
        }
        self.replies.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => OutboxError::Full,
            TrySendError::Closed(_) => OutboxError::Closed,
        })
    }
}

impl Inbox {
    /// Next message to write, or `None` once every `Outbox` is gone
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        loop {
            tokio::select! {
                biased;
                message = self.replies.recv() => return message,
                changed = self.transform.changed() => {
                    changed.ok()?;
                    if let Some(message) = self.transform.borrow_and_update().clone() {
                        return Some(message);
                    }
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<ServerMessage> {
        if let Ok(message) = self.replies.try_recv() {
            return Some(message);
        }
        if self.transform.has_changed().unwrap_or(false) {
            return self.transform.borrow_and_update().clone();
        }
        None
    }
}
