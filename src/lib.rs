#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Concurrency
//!
//! Concurrency building blocks for running long, suspendable work safely.
//!
//! ## Overview
//!
//! The crate provides three cooperating pieces:
//!
//! - a **serialized store** whose reads and writes are totally ordered, so
//!   concurrent callers never observe torn or lost updates;
//! - a **cancellable operation** that wraps one long-running unit of work,
//!   suspends its caller until the work finishes or is cancelled, and
//!   releases that caller exactly once;
//! - a **sequencing driver** that runs operations one after another (or all
//!   at once with `join`) and stops early when the sequence is cancelled,
//!   forwarding cancellation only to the steps currently running.
//!
//! Cancellation never propagates implicitly. Each link between scopes is an
//! explicit one-hop registration, so work started independently inside a
//! step keeps running when the outer sequence is cancelled.
//!
//! ## Module Organization
//!
//! - [`store`] - Serialized key-value store and its actor front-end
//! - [`cancellation`] - Cancel scopes and handler registration
//! - [`operation`] - Cancellable operations, work units and checkpoint tokens
//! - [`sequence`] - Sequencing driver
//! - [`state_machine`] - Operation lifecycle states and transitions
//! - [`actors`] - Actor/message traits
//! - [`config`] - Layered configuration
//! - [`logging`] - Console logging and structured log macros
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tasker_concurrency::{CancellableOperation, OperationOutcome, Sequence};
//!
//! # async fn example() -> tasker_concurrency::Result<()> {
//! tasker_concurrency::logging::init_tracing();
//!
//! let op = CancellableOperation::timed("fetch", Duration::from_secs(1));
//! assert_eq!(op.start().await?, OperationOutcome::Completed);
//!
//! let report = Sequence::new("pipeline")
//!     .run(vec![
//!         CancellableOperation::timed("extract", Duration::from_millis(200)),
//!         CancellableOperation::timed("load", Duration::from_millis(300)),
//!     ])
//!     .await?;
//! println!("{} steps completed", report.completed_steps());
//! # Ok(())
//! # }
//! ```

pub mod actors;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod logging;
pub mod operation;
pub mod sequence;
pub mod state_machine;
pub mod store;

pub use cancellation::{CancelReason, CancelScope, Registration};
pub use config::{ConfigManager, TaskerConfig};
pub use error::{Result, TaskerError};
pub use operation::{
    CancelPolicy, CancellableOperation, OperationOutcome, Work, WorkContext, WorkStatus,
};
pub use sequence::{Sequence, SequenceOutcome, SequenceReport, StepReport};
pub use state_machine::{OperationEvent, OperationState};
pub use store::{Entry, SerializedStore, StoreActor};
