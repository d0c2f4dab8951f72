//! Error types for the Tasker concurrency primitives.
//!
//! Lookups that miss, resumes that lose a race, and cancellations that arrive
//! after completion are ordinary results, not errors. The variants here cover
//! misuse of an operation's lifecycle and failures of the ambient stack.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::state_machine::StateMachineError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskerError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("State transition error: {0}")]
    StateTransitionError(String),
    #[error("Work for operation '{operation}' panicked: {message}")]
    WorkPanicked { operation: String, message: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TaskerError {
    /// Build an `InvalidState` error for an operation or sequence
    pub fn invalid_state(what: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        TaskerError::InvalidState(format!("{what}: {}", reason.into()))
    }
}

impl From<StateMachineError> for TaskerError {
    fn from(error: StateMachineError) -> Self {
        TaskerError::StateTransitionError(error.to_string())
    }
}

impl From<ConfigurationError> for TaskerError {
    fn from(error: ConfigurationError) -> Self {
        TaskerError::ConfigurationError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TaskerError>;
