//! # Checkpoint Tokens
//!
//! A [`CheckpointToken`] releases exactly one suspended caller. It is an owned
//! handle consumed by [`CheckpointToken::resume`], so resuming twice does not
//! type-check. When two paths race to resume the same waiter (natural
//! completion and cancellation), they share a [`ResumeSlot`]: a
//! compare-and-swap picks the winner, the winner takes the token out of the
//! slot, and the loser observes [`ResumeResult::AlreadyConsumed`].

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::OperationOutcome;
use crate::error::{Result, TaskerError};

/// What the released caller receives
pub type Resolution = Result<OperationOutcome>;

/// Single-use handle that releases one waiter
#[derive(Debug)]
pub struct CheckpointToken {
    operation_id: Uuid,
    sender: oneshot::Sender<Resolution>,
}

/// The suspended side of a [`CheckpointToken`]
#[derive(Debug)]
pub struct CheckpointWaiter {
    operation_id: Uuid,
    receiver: oneshot::Receiver<Resolution>,
}

impl CheckpointToken {
    pub fn new(operation_id: Uuid) -> (Self, CheckpointWaiter) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                operation_id,
                sender,
            },
            CheckpointWaiter {
                operation_id,
                receiver,
            },
        )
    }

    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    /// Release the waiter; returns `false` if the waiter is gone
    pub fn resume(self, resolution: Resolution) -> bool {
        self.sender.send(resolution).is_ok()
    }
}

impl CheckpointWaiter {
    /// Suspend until the token is resumed
    ///
    /// A token dropped without resuming surfaces as an internal error rather
    /// than a hang.
    pub async fn wait(self) -> Resolution {
        let operation_id = self.operation_id;
        self.receiver.await.unwrap_or_else(|_| {
            Err(TaskerError::Internal(format!(
                "checkpoint token for operation {operation_id} dropped without resume"
            )))
        })
    }
}

/// Result of attempting to resume through a [`ResumeSlot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeResult {
    /// This call released the waiter
    Resumed,
    /// Another path already consumed the token; nothing happened
    AlreadyConsumed,
}

/// First-wins holder for a [`CheckpointToken`]
#[derive(Debug, Default)]
pub struct ResumeSlot {
    resolved: AtomicBool,
    token: Mutex<Option<CheckpointToken>>,
}

impl ResumeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place the token; must happen before any path can call `resume`
    pub fn arm(&self, token: CheckpointToken) {
        *self.token.lock() = Some(token);
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::SeqCst)
    }

    /// Release the waiter with `resolution` if nobody has yet
    pub fn resume(&self, resolution: Resolution) -> ResumeResult {
        if self
            .resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return ResumeResult::AlreadyConsumed;
        }

        // The reference is cleared here, so a late firing finds an empty slot
        match self.token.lock().take() {
            Some(token) => {
                token.resume(resolution);
                ResumeResult::Resumed
            }
            None => ResumeResult::AlreadyConsumed,
        }
    }
}
