//! # Sequencing Driver
//!
//! Runs a list of [`CancellableOperation`]s strictly one after another as a
//! single logical task.
//!
//! Every step is started within the sequence's own [`CancelScope`], so the
//! scope forwards cancellation to whichever step is currently running, and
//! only to it. Steps that have not started yet see the cancelled scope at
//! their entry checkpoint and are skipped without running their work, which
//! short-circuits the rest of the sequence without waiting on any of their
//! durations.
//!
//! [`Sequence::join`] runs the same kind of step list concurrently instead,
//! releasing its caller once every step has been released.
//!
//! A sequence started independently (for example from inside a step's work)
//! is not linked to anything and keeps running when an outer sequence is
//! cancelled. To chain one explicitly, create it with [`Sequence::chained`].
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tasker_concurrency::operation::CancellableOperation;
//! use tasker_concurrency::sequence::Sequence;
//!
//! # async fn example() -> tasker_concurrency::Result<()> {
//! let sequence = Sequence::new("sleepers");
//! let steps = (1..=6)
//!     .map(|i| CancellableOperation::timed(format!("sleep-{i}"), Duration::from_secs(i)))
//!     .collect();
//!
//! let runner = sequence.clone();
//! let handle = tokio::spawn(async move { runner.run(steps).await });
//!
//! tokio::time::sleep(Duration::from_secs(2)).await;
//! sequence.cancel();
//!
//! let report = handle.await.expect("sequence task")?;
//! println!("{} steps cancelled", report.cancelled_steps());
//! # Ok(())
//! # }
//! ```

use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::cancellation::{CancelReason, CancelScope, Registration};
use crate::config::SequenceConfig;
use crate::error::{Result, TaskerError};
use crate::log_sequence;
use crate::operation::{CancellableOperation, OperationOutcome};

/// How a sequence as a whole ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceOutcome {
    /// Every step completed
    Completed,
    /// At least one step was cancelled
    Cancelled,
}

/// What released the sequence for one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub operation_id: Uuid,
    pub name: String,
    pub outcome: OperationOutcome,
}

/// Result of [`Sequence::run`] or [`Sequence::join`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    pub sequence_id: Uuid,
    pub name: String,
    pub outcome: SequenceOutcome,
    pub steps: Vec<StepReport>,
}

impl SequenceReport {
    pub fn completed_steps(&self) -> usize {
        self.count(OperationOutcome::Completed)
    }

    pub fn cancelled_steps(&self) -> usize {
        self.count(OperationOutcome::Cancelled)
    }

    fn count(&self, outcome: OperationOutcome) -> usize {
        self.steps.iter().filter(|s| s.outcome == outcome).count()
    }
}

struct SequenceInner {
    id: Uuid,
    name: String,
    scope: CancelScope,
    parent: Option<CancelScope>,
    max_steps: Option<usize>,
    started: AtomicBool,
    current_step: Mutex<Option<String>>,
}

/// Handle to a sequence of cancellable steps
#[derive(Clone)]
pub struct Sequence {
    inner: Arc<SequenceInner>,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None, None)
    }

    /// Sequence linked one hop below `parent`
    ///
    /// Cancelling `parent` while this sequence runs cancels the sequence,
    /// which in turn cancels its running step.
    pub fn chained(name: impl Into<String>, parent: &CancelScope) -> Self {
        Self::build(name.into(), Some(parent.clone()), None)
    }

    /// Sequence that enforces the configured step limit
    pub fn from_config(name: impl Into<String>, config: &SequenceConfig) -> Self {
        Self::build(name.into(), None, Some(config.max_steps))
    }

    fn build(name: String, parent: Option<CancelScope>, max_steps: Option<usize>) -> Self {
        Self {
            inner: Arc::new(SequenceInner {
                id: Uuid::new_v4(),
                scope: CancelScope::new(format!("sequence:{name}")),
                name,
                parent,
                max_steps,
                started: AtomicBool::new(false),
                current_step: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The scope every step is started within
    pub fn scope(&self) -> &CancelScope {
        &self.inner.scope
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.scope.is_cancelled()
    }

    /// Name of the step currently executing, if any
    pub fn current_step(&self) -> Option<String> {
        self.inner.current_step.lock().clone()
    }

    /// Cancel the sequence; returns `false` if it was already cancelled
    pub fn cancel(&self) -> bool {
        self.inner.scope.cancel()
    }

    /// Run `steps` in order and suspend until all finish or the sequence is cancelled
    ///
    /// A step that fails cancels the sequence scope so the steps after it are
    /// skipped at their entry checkpoint; the first failure is returned once
    /// every step has been released.
    pub async fn run(&self, steps: Vec<CancellableOperation>) -> Result<SequenceReport> {
        let _parent_registration = self.prepare(steps.len())?;
        let inner = &self.inner;

        log_sequence!(info, "STARTED", sequence_id: inner.id, name: inner.name,
            steps: steps.len(),
            mode: "sequential"
        );

        let mut results = Vec::with_capacity(steps.len());
        for step in &steps {
            *inner.current_step.lock() = Some(step.name().to_string());
            let outcome = step.start_within(&inner.scope).await;
            *inner.current_step.lock() = None;

            results.push(self.released(step, outcome));
        }

        self.collect(&steps, results)
    }

    /// Start every step at once and suspend until all of them are released
    ///
    /// Steps share the sequence scope, so cancelling the sequence (or one
    /// step failing) cancels every step still running and skips any that
    /// have not reached their entry checkpoint.
    pub async fn join(&self, steps: Vec<CancellableOperation>) -> Result<SequenceReport> {
        let _parent_registration = self.prepare(steps.len())?;
        let inner = &self.inner;

        log_sequence!(info, "STARTED", sequence_id: inner.id, name: inner.name,
            steps: steps.len(),
            mode: "concurrent"
        );

        let results = join_all(steps.iter().map(|step| async move {
            let outcome = step.start_within(&inner.scope).await;
            self.released(step, outcome)
        }))
        .await;

        self.collect(&steps, results)
    }

    /// Step limit, single-use check, and the optional one-hop parent link
    fn prepare(&self, step_count: usize) -> Result<Option<Registration>> {
        let inner = &self.inner;

        if let Some(max_steps) = inner.max_steps {
            if step_count > max_steps {
                return Err(TaskerError::ValidationError(format!(
                    "sequence '{}' has {step_count} steps, limit is {max_steps}",
                    inner.name
                )));
            }
        }

        if inner.started.swap(true, Ordering::SeqCst) {
            return Err(TaskerError::invalid_state(self, "already run"));
        }

        let Some(parent) = &inner.parent else {
            return Ok(None);
        };
        let scope = inner.scope.clone();
        let registration = parent.register(move |_| {
            scope.cancel_with(CancelReason::ParentCancelled);
        });
        if registration.is_none() {
            inner.scope.cancel_with(CancelReason::ParentCancelled);
        }
        Ok(registration)
    }

    fn released(
        &self,
        step: &CancellableOperation,
        outcome: Result<OperationOutcome>,
    ) -> Result<OperationOutcome> {
        let inner = &self.inner;
        match &outcome {
            Ok(released) => {
                log_sequence!(debug, "STEP_RELEASED", sequence_id: inner.id, name: inner.name,
                    step: step.name(),
                    outcome: released
                );
            }
            Err(e) => {
                log_sequence!(error, "STEP_FAILED", sequence_id: inner.id, name: inner.name,
                    step: step.name(),
                    error: e
                );
                inner.scope.cancel_with(CancelReason::StepFailed);
            }
        }
        outcome
    }

    fn collect(
        &self,
        steps: &[CancellableOperation],
        results: Vec<Result<OperationOutcome>>,
    ) -> Result<SequenceReport> {
        let inner = &self.inner;
        let mut reports = Vec::with_capacity(steps.len());
        let mut first_error = None;

        for (step, result) in steps.iter().zip(results) {
            match result {
                Ok(outcome) => reports.push(StepReport {
                    operation_id: step.id(),
                    name: step.name().to_string(),
                    outcome,
                }),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            log_sequence!(warn, "FAILED", sequence_id: inner.id, name: inner.name,
                error: &e,
                released: reports.len()
            );
            return Err(e);
        }

        let outcome = if reports
            .iter()
            .any(|r| r.outcome == OperationOutcome::Cancelled)
        {
            SequenceOutcome::Cancelled
        } else {
            SequenceOutcome::Completed
        };

        log_sequence!(info, "FINISHED", sequence_id: inner.id, name: inner.name,
            outcome: outcome,
            completed: reports.iter().filter(|r| r.outcome == OperationOutcome::Completed).count()
        );

        Ok(SequenceReport {
            sequence_id: inner.id,
            name: inner.name.clone(),
            outcome,
            steps: reports,
        })
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sequence '{}' ({})", self.inner.name, self.inner.id)
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("cancelled", &self.is_cancelled())
            .field("chained", &self.inner.parent.is_some())
            .finish()
    }
}
