//! # Cancellable Operations
//!
//! A [`CancellableOperation`] wraps one long-running unit of [`Work`] and
//! suspends its caller until the work finishes or the operation is cancelled.
//!
//! ## Cancellation policy
//!
//! Cancellation is cooperative at entry and best-effort mid-flight:
//!
//! - Cancelled before the entry checkpoint: the work is never invoked and the
//!   operation moves straight to `Cancelled`.
//! - Cancelled while `Running`: the caller is released immediately with
//!   [`OperationOutcome::Cancelled`] and the state becomes `CancelRequested`.
//!   The work keeps running in the background and its eventual completion
//!   (`Completed`, or `Cancelled` if it exited early) no longer reaches the
//!   caller.
//! - Cancelled after completion: no effect.
//!
//! An operation built with [`CancelPolicy::EntryCheckpointOnly`] keeps the
//! entry checkpoint but has no mid-flight release: the caller stays suspended
//! until the work returns, and the state still records `CancelRequested` so
//! the final state reflects how the work exited.
//!
//! Work that panics moves the operation to `Failed` and the caller receives
//! [`TaskerError::WorkPanicked`].
//!
//! Natural completion and mid-flight cancellation race to release the same
//! caller through a [`ResumeSlot`]; the first one wins and the other is
//! discarded silently.
//!
//! ## One-hop parent link
//!
//! [`CancellableOperation::start_within`] links the operation to a single
//! enclosing [`CancelScope`]. While the operation is running, cancelling that
//! scope cancels this operation, and nothing else: work started inside this
//! operation only hears about it if it linked itself to
//! [`CancellableOperation::scope`].

pub mod checkpoint;
pub mod work;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::cancellation::{CancelReason, CancelScope, Registration};
use crate::config::OperationConfig;
use crate::error::{Result, TaskerError};
use crate::log_operation;
use crate::state_machine::{
    operation_state_machine::OperationTransition, OperationEvent, OperationState,
    OperationStateMachine,
};

pub use checkpoint::{CheckpointToken, CheckpointWaiter, ResumeResult, ResumeSlot};
pub use work::{work_fn, FnWork, TimedWork, Work, WorkContext, WorkStatus};

/// What released the caller of [`CancellableOperation::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    Completed,
    Cancelled,
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// How a cancel that arrives while the work is running treats the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Release the caller immediately; the work finishes in the background
    #[default]
    ReleaseOnCancel,
    /// Only the entry checkpoint honours cancellation; the caller waits for in-flight work
    EntryCheckpointOnly,
}

impl fmt::Display for CancelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReleaseOnCancel => write!(f, "release_on_cancel"),
            Self::EntryCheckpointOnly => write!(f, "entry_checkpoint_only"),
        }
    }
}

struct OperationInner {
    id: Uuid,
    name: String,
    policy: CancelPolicy,
    state: Mutex<OperationStateMachine>,
    scope: CancelScope,
    parent: OnceLock<CancelScope>,
    work: Mutex<Option<Box<dyn Work>>>,
    slot: ResumeSlot,
    registrations: Mutex<Vec<Registration>>,
}

/// Handle to a single cancellable unit of work
///
/// Cloning yields another handle to the same operation, so one task can
/// `start` it while another calls `cancel`.
#[derive(Clone)]
pub struct CancellableOperation {
    inner: Arc<OperationInner>,
}

impl CancellableOperation {
    pub fn new(name: impl Into<String>, work: impl Work) -> Self {
        Self::with_policy(name, work, CancelPolicy::default())
    }

    pub fn with_policy(name: impl Into<String>, work: impl Work, policy: CancelPolicy) -> Self {
        let name = name.into();
        Self {
            inner: Arc::new(OperationInner {
                id: Uuid::new_v4(),
                scope: CancelScope::new(format!("operation:{name}")),
                name,
                policy,
                state: Mutex::new(OperationStateMachine::new()),
                parent: OnceLock::new(),
                work: Mutex::new(Some(Box::new(work))),
                slot: ResumeSlot::new(),
                registrations: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Operation backed by an async closure
    pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(WorkContext) -> Fut + Send + 'static,
        Fut: Future<Output = WorkStatus> + Send + 'static,
    {
        Self::new(name, work_fn(f))
    }

    /// Operation whose work is a fixed-duration timer
    pub fn timed(name: impl Into<String>, duration_hint: Duration) -> Self {
        Self::new(name, TimedWork::new(duration_hint))
    }

    /// Timed operation whose timer stops early once cancelled
    pub fn timed_cooperative(name: impl Into<String>, duration_hint: Duration) -> Self {
        Self::new(name, TimedWork::cooperative(duration_hint))
    }

    /// Timed operation using the configured default duration
    pub fn from_config(name: impl Into<String>, config: &OperationConfig) -> Self {
        Self::timed(name, config.default_duration())
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn policy(&self) -> CancelPolicy {
        self.inner.policy
    }

    pub fn state(&self) -> OperationState {
        self.inner.state.lock().current_state()
    }

    pub fn transitions(&self) -> Vec<OperationTransition> {
        self.inner.state.lock().transitions().to_vec()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.inner.scope.is_cancelled()
    }

    /// This operation's own scope; link child work to it to chain cancellation
    pub fn scope(&self) -> &CancelScope {
        &self.inner.scope
    }

    /// The enclosing scope, once one has been attached
    pub fn parent(&self) -> Option<&CancelScope> {
        self.inner.parent.get()
    }

    /// Request cancellation
    ///
    /// Returns `true` if this call had an effect. Calling it again, or after
    /// the operation reached a terminal state, is a no-op returning `false`.
    pub fn cancel(&self) -> bool {
        OperationInner::request_cancel(&self.inner, CancelReason::Requested)
    }

    /// Run the work and suspend until it finishes or the operation is cancelled
    ///
    /// Must be called from within a tokio runtime; the work itself runs on a
    /// spawned task so it can outlive an early release of the caller.
    pub async fn start(&self) -> Result<OperationOutcome> {
        let waiter = self.begin()?;
        waiter.wait().await
    }

    /// Attach `parent` as this operation's single enclosing scope, then start
    pub async fn start_within(&self, parent: &CancelScope) -> Result<OperationOutcome> {
        self.attach_parent(parent)?;
        self.start().await
    }

    fn attach_parent(&self, parent: &CancelScope) -> Result<()> {
        match self.inner.parent.get() {
            Some(existing) if existing.same_scope(parent) => Ok(()),
            Some(_) => Err(TaskerError::invalid_state(
                self,
                "already linked to a different enclosing scope",
            )),
            None => self.inner.parent.set(parent.clone()).map_err(|_| {
                TaskerError::invalid_state(self, "enclosing scope attached concurrently")
            }),
        }
    }

    /// Entry checkpoint, registration, and spawn; everything before the wait
    fn begin(&self) -> Result<CheckpointWaiter> {
        let inner = &self.inner;
        let work = inner
            .work
            .lock()
            .take()
            .ok_or_else(|| TaskerError::invalid_state(self, "already started"))?;

        let (token, waiter) = CheckpointToken::new(inner.id);
        inner.slot.arm(token);

        let mut registrations = Vec::with_capacity(2);

        if let Some(parent) = inner.parent.get() {
            let weak = Arc::downgrade(inner);
            match parent.register(move |_| {
                if let Some(inner) = weak.upgrade() {
                    OperationInner::request_cancel(&inner, CancelReason::ParentCancelled);
                }
            }) {
                Some(registration) => registrations.push(registration),
                None => {
                    inner.scope.cancel_with(CancelReason::ParentCancelled);
                }
            }
        }

        let weak = Arc::downgrade(inner);
        let own = inner.scope.register(move |reason| {
            if let Some(inner) = weak.upgrade() {
                OperationInner::on_cancel(&inner, reason);
            }
        });

        let mut state = inner.state.lock();

        if own.is_none() || inner.scope.is_cancelled() {
            // Entry checkpoint: the work is dropped without ever being polled
            drop(work);
            state.transition(OperationEvent::Cancel)?;
            inner.slot.resume(Ok(OperationOutcome::Cancelled));
            log_operation!(info, "SKIPPED", operation_id: inner.id, name: inner.name,
                reason: inner.scope.reason()
            );
            return Ok(waiter);
        }

        state.transition(OperationEvent::Start)?;
        registrations.extend(own);
        *inner.registrations.lock() = registrations;

        log_operation!(debug, "STARTED", operation_id: inner.id, name: inner.name,
            parent_scope: inner.parent.get().map(CancelScope::id)
        );

        let ctx = WorkContext::new(inner.id, inner.scope.clone());
        let task_inner = Arc::clone(inner);
        tokio::spawn(async move {
            let result = AssertUnwindSafe(work.run(ctx)).catch_unwind().await;
            OperationInner::finish(&task_inner, result);
        });

        Ok(waiter)
    }
}

impl OperationInner {
    /// Terminal check, flag, and state change happen under one state lock
    ///
    /// Completion takes the same lock, so a cancel can never report success
    /// against an operation that has already finished.
    fn request_cancel(inner: &Arc<OperationInner>, reason: CancelReason) -> bool {
        let pending = {
            let mut state = inner.state.lock();
            if state.current_state().is_terminal() {
                debug!(
                    operation_id = %inner.id,
                    name = %inner.name,
                    "Cancel after completion ignored"
                );
                return false;
            }

            let Some(pending) = inner.scope.trigger(reason) else {
                return false;
            };

            if state.current_state() == OperationState::Running {
                if let Err(e) = state.transition(OperationEvent::RequestCancel) {
                    warn!(operation_id = %inner.id, error = %e, "Unexpected cancel transition failure");
                }
            }
            pending
        };

        pending.fire();
        true
    }

    /// Cancellation handler registered on the operation's own scope
    fn on_cancel(inner: &Arc<OperationInner>, reason: CancelReason) {
        let mut state = inner.state.lock();

        match state.current_state() {
            // The scope was cancelled directly rather than through request_cancel
            OperationState::Running => {
                if let Err(e) = state.transition(OperationEvent::RequestCancel) {
                    warn!(operation_id = %inner.id, error = %e, "Unexpected cancel transition failure");
                    return;
                }
            }
            OperationState::CancelRequested => {}
            // Pending operations are caught by the entry checkpoint; terminal ones are done
            _ => return,
        }

        match inner.policy {
            CancelPolicy::ReleaseOnCancel => {
                if inner.slot.resume(Ok(OperationOutcome::Cancelled)) == ResumeResult::Resumed {
                    log_operation!(info, "CANCELLED_IN_FLIGHT", operation_id: inner.id, name: inner.name,
                        reason: reason
                    );
                }
            }
            CancelPolicy::EntryCheckpointOnly => {
                log_operation!(info, "CANCEL_DEFERRED", operation_id: inner.id, name: inner.name,
                    reason: reason
                );
            }
        }
    }

    /// Completion callback for the spawned work
    fn finish(inner: &Arc<OperationInner>, result: std::result::Result<WorkStatus, Box<dyn Any + Send>>) {
        match result {
            Ok(status) => {
                let mut state = inner.state.lock();

                // Work on another thread can observe the flag before on_cancel runs
                if status == WorkStatus::Interrupted
                    && state.current_state() == OperationState::Running
                    && inner.scope.is_cancelled()
                {
                    if let Err(e) = state.transition(OperationEvent::RequestCancel) {
                        warn!(operation_id = %inner.id, error = %e, "Unexpected cancel transition failure");
                    }
                }

                let event = match (state.current_state(), status) {
                    (OperationState::CancelRequested, WorkStatus::Interrupted) => {
                        OperationEvent::Cancel
                    }
                    _ => OperationEvent::Complete,
                };

                match state.transition(event) {
                    Ok(final_state) => {
                        let outcome = if final_state == OperationState::Completed {
                            OperationOutcome::Completed
                        } else {
                            OperationOutcome::Cancelled
                        };

                        match inner.slot.resume(Ok(outcome)) {
                            ResumeResult::Resumed => {
                                log_operation!(debug, "COMPLETED", operation_id: inner.id, name: inner.name,
                                    state: final_state
                                );
                            }
                            ResumeResult::AlreadyConsumed => {
                                log_operation!(debug, "LATE_COMPLETION_DISCARDED", operation_id: inner.id, name: inner.name,
                                    state: final_state
                                );
                            }
                        }
                    }
                    Err(e) => {
                        warn!(operation_id = %inner.id, error = %e, "Unexpected completion transition failure");
                    }
                }
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                let mut state = inner.state.lock();
                if let Err(e) = state.transition(OperationEvent::Fail) {
                    warn!(operation_id = %inner.id, error = %e, "Unexpected fail transition error");
                }
                error!(
                    operation_id = %inner.id,
                    name = %inner.name,
                    message = %message,
                    state = %state.current_state(),
                    "Operation work panicked"
                );
                inner.slot.resume(Err(TaskerError::WorkPanicked {
                    operation: inner.name.clone(),
                    message,
                }));
            }
        }

        // A late cancel() now finds nothing registered
        inner.registrations.lock().clear();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl fmt::Display for CancellableOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation '{}' ({})", self.inner.name, self.inner.id)
    }
}

impl fmt::Debug for CancellableOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellableOperation")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("policy", &self.inner.policy)
            .field("state", &self.state())
            .field("cancel_requested", &self.is_cancel_requested())
            .finish()
    }
}
