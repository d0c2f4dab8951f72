//! # Work Units
//!
//! The long-running, suspendable unit a [`CancellableOperation`] wraps.
//!
//! Work signals completion by returning, which happens exactly once. Work
//! that wants cooperative early exit consults its [`WorkContext`] at its own
//! checkpoints and returns [`WorkStatus::Interrupted`]; work that never looks
//! simply runs to the end after its caller has been released.
//!
//! [`CancellableOperation`]: super::CancellableOperation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::cancellation::CancelScope;

/// How a unit of work ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    /// Ran to its natural end
    Finished,
    /// Observed cancellation at an internal checkpoint and stopped early
    Interrupted,
}

/// Cancellation observability handed to running work
#[derive(Debug, Clone)]
pub struct WorkContext {
    operation_id: Uuid,
    scope: CancelScope,
}

impl WorkContext {
    pub(crate) fn new(operation_id: Uuid, scope: CancelScope) -> Self {
        Self {
            operation_id,
            scope,
        }
    }

    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    /// Checkpoint: has the owning operation been asked to cancel?
    ///
    /// A plain atomic read, valid from any thread or runtime flavor,
    /// including blocking sections.
    pub fn is_cancelled(&self) -> bool {
        self.scope.is_cancelled()
    }

    /// Resolve once the owning operation is asked to cancel
    pub async fn cancelled(&self) {
        self.scope.cancelled().await
    }

    /// The owning operation's scope, for explicitly chaining child work
    pub fn scope(&self) -> &CancelScope {
        &self.scope
    }
}

/// A unit of suspendable work
#[async_trait]
pub trait Work: Send + 'static {
    async fn run(self: Box<Self>, ctx: WorkContext) -> WorkStatus;
}

/// Fixed-duration timer standing in for real I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedWork {
    duration: Duration,
    cooperative: bool,
}

impl TimedWork {
    /// Sleeps for the full duration, ignoring cancellation
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            cooperative: false,
        }
    }

    /// Sleeps for the duration, or until the operation is cancelled
    pub fn cooperative(duration: Duration) -> Self {
        Self {
            duration,
            cooperative: true,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[async_trait]
impl Work for TimedWork {
    async fn run(self: Box<Self>, ctx: WorkContext) -> WorkStatus {
        if !self.cooperative {
            tokio::time::sleep(self.duration).await;
            return WorkStatus::Finished;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.duration) => WorkStatus::Finished,
            _ = ctx.cancelled() => WorkStatus::Interrupted,
        }
    }
}

/// Adapter turning an async closure into [`Work`]
pub struct FnWork<F> {
    f: F,
}

/// Wrap `f` so it can be used as [`Work`]
pub fn work_fn<F, Fut>(f: F) -> FnWork<F>
where
    F: FnOnce(WorkContext) -> Fut + Send + 'static,
    Fut: Future<Output = WorkStatus> + Send + 'static,
{
    FnWork { f }
}

#[async_trait]
impl<F, Fut> Work for FnWork<F>
where
    F: FnOnce(WorkContext) -> Fut + Send + 'static,
    Fut: Future<Output = WorkStatus> + Send + 'static,
{
    async fn run(self: Box<Self>, ctx: WorkContext) -> WorkStatus {
        (self.f)(ctx).await
    }
}
