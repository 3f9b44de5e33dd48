//! Update collection over a channel.
//!
//! Participants (or the transport layer on their behalf) push updates through
//! an [`UpdateSender`]; the coordinator drains the [`Inbox`] under a
//! [`CollectionPolicy`] and hands the batch to the orchestrator.

use std::time::Instant;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};

use crate::config::CollectionPolicy;
use crate::update::Update;

/// Handle for submitting updates to an [`Inbox`].
#[derive(Clone, Debug)]
pub struct UpdateSender {
    sender: Sender<Update>,
}

impl UpdateSender {
    /// Submit an update without blocking.
    pub fn send(&self, update: Update) -> Result<(), String> {
        self.sender
            .try_send(update)
            .map_err(|e| format!("Failed to submit update: {}", e))
    }
}

/// Receiving end of the update channel.
#[derive(Debug)]
pub struct Inbox {
    receiver: Receiver<Update>,
    sender: Sender<Update>,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Inbox {
    /// Inbox with unbounded capacity.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { receiver, sender }
    }

    /// Inbox holding at most `capacity` pending updates; further sends fail.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { receiver, sender }
    }

    /// Get a sender for submitting updates.
    pub fn sender(&self) -> UpdateSender {
        UpdateSender {
            sender: self.sender.clone(),
        }
    }

    /// Updates waiting to be collected.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Collect one round's updates.
    ///
    /// Returns in arrival order once the deadline passes or the quorum is
    /// reached. The inbox keeps its own sender, so collection never ends on
    /// disconnection alone.
    pub fn collect(&self, policy: &CollectionPolicy) -> Vec<Update> {
        let deadline = Instant::now() + policy.deadline();
        let quorum = policy.quorum.unwrap_or(usize::MAX);
        let mut batch = Vec::new();

        while batch.len() < quorum {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(update) => batch.push(update),
                Err(RecvTimeoutError::Timeout) => {
                    tracing::debug!(collected = batch.len(), "collection deadline reached");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if batch.len() >= quorum {
            tracing::debug!(collected = batch.len(), quorum, "collection quorum reached");
        }
        batch
    }

    /// Take everything already queued without waiting.
    pub fn drain(&self) -> Vec<Update> {
        self.receiver.try_iter().collect()
    }
}
