use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a cancellable operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    /// Created but not started
    #[default]
    Pending,
    /// Underlying work is in flight
    Running,
    /// Cancel was requested while the work was in flight; the work may still
    /// finish, with or without the waiter depending on the cancel policy
    CancelRequested,
    /// The underlying work finished
    Completed,
    /// The work was skipped at its entry checkpoint or exited early
    Cancelled,
    /// The work panicked before finishing
    Failed,
}

impl OperationState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Check if the underlying work may still be executing
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::CancelRequested)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::CancelRequested => write!(f, "cancel_requested"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for OperationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "cancel_requested" => Ok(Self::CancelRequested),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid operation state: {s}")),
        }
    }
}
