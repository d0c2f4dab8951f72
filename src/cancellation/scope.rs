use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

/// Why a scope was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// `cancel()` was called on the scope's owner
    Requested,
    /// Forwarded from the single enclosing scope this one is linked to
    ParentCancelled,
    /// A sibling step failed and the enclosing sequence is winding down
    StepFailed,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::ParentCancelled => write!(f, "parent_cancelled"),
            Self::StepFailed => write!(f, "step_failed"),
        }
    }
}

type CancelHandler = Box<dyn FnOnce(CancelReason) + Send>;

#[derive(Default)]
struct ScopeState {
    reason: Option<CancelReason>,
    handlers: BTreeMap<u64, CancelHandler>,
    next_handler_id: u64,
}

struct ScopeInner {
    id: Uuid,
    label: String,
    /// Mirrors `state.reason.is_some()` for lock-free checkpoint reads
    cancelled: AtomicBool,
    state: Mutex<ScopeState>,
    notify: Notify,
}

/// Shared cancellation state with first-wins `cancel` and one-shot handlers
#[derive(Clone)]
pub struct CancelScope {
    inner: Arc<ScopeInner>,
}

impl CancelScope {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: Uuid::new_v4(),
                label: label.into(),
                cancelled: AtomicBool::new(false),
                state: Mutex::new(ScopeState::default()),
                notify: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Checkpoint read: has cancellation been requested?
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.inner.state.lock().reason
    }

    /// Request cancellation on behalf of this scope's owner
    pub fn cancel(&self) -> bool {
        self.cancel_with(CancelReason::Requested)
    }

    /// Request cancellation with an explicit reason
    ///
    /// Returns `true` if this call triggered the cancellation (first caller
    /// wins). Registered handlers run on the calling thread, outside the
    /// scope lock, exactly once.
    pub fn cancel_with(&self, reason: CancelReason) -> bool {
        self.trigger(reason).map(PendingCancel::fire).is_some()
    }

    /// Record the cancellation and drain handlers without running them
    ///
    /// Checkpoints observe the flag as soon as this returns. Owners use it to
    /// update their own state atomically with the flag, then call
    /// [`PendingCancel::fire`] once their locks are released.
    pub(crate) fn trigger(&self, reason: CancelReason) -> Option<PendingCancel> {
        let mut state = self.inner.state.lock();
        if self
            .inner
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        state.reason = Some(reason);

        Some(PendingCancel {
            scope: Arc::clone(&self.inner),
            reason,
            handlers: std::mem::take(&mut state.handlers),
        })
    }

    /// Register a one-shot handler to run when this scope is cancelled
    ///
    /// Returns `None` without running the handler if the scope is already
    /// cancelled; callers treat that as cancellation observed at their entry
    /// checkpoint. The check and the insert happen under the lock `cancel`
    /// drains under, so a concurrent cancellation is never missed.
    pub fn register<F>(&self, handler: F) -> Option<Registration>
    where
        F: FnOnce(CancelReason) + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        if self.is_cancelled() {
            return None;
        }

        let handler_id = state.next_handler_id;
        state.next_handler_id += 1;
        state.handlers.insert(handler_id, Box::new(handler));

        Some(Registration {
            scope: Arc::downgrade(&self.inner),
            handler_id,
        })
    }

    /// Number of handlers waiting for this scope
    pub fn registered_handlers(&self) -> usize {
        self.inner.state.lock().handlers.len()
    }

    /// Resolve once the scope is cancelled (immediately if it already is)
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Enable before the flag check so a concurrent notify_waiters is not lost
        notified.as_mut().enable();

        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Whether two handles refer to the same scope
    pub fn same_scope(&self, other: &CancelScope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for CancelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelScope")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A cancellation that has been recorded but not yet announced
#[must_use = "handlers and waiters are only released by fire()"]
pub(crate) struct PendingCancel {
    scope: Arc<ScopeInner>,
    reason: CancelReason,
    handlers: BTreeMap<u64, CancelHandler>,
}

impl PendingCancel {
    /// Wake waiters and run the drained handlers on the calling thread
    pub(crate) fn fire(self) {
        debug!(
            scope_id = %self.scope.id,
            label = %self.scope.label,
            reason = %self.reason,
            handlers = self.handlers.len(),
            "Cancel scope triggered"
        );

        self.scope.notify.notify_waiters();
        for (_, handler) in self.handlers {
            handler(self.reason);
        }
    }
}

/// Deregisters its handler when dropped
///
/// Dropping after the handler has already fired is a no-op.
#[must_use = "dropping a Registration immediately deregisters the handler"]
pub struct Registration {
    scope: Weak<ScopeInner>,
    handler_id: u64,
}

impl Registration {
    /// Explicitly deregister; equivalent to dropping
    pub fn deregister(self) {}
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(inner) = self.scope.upgrade() {
            inner.state.lock().handlers.remove(&self.handler_id);
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("handler_id", &self.handler_id)
            .finish()
    }
}
