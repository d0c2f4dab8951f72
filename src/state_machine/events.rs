use serde::{Deserialize, Serialize};

/// Events that drive operation state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OperationEvent {
    /// Entry checkpoint passed, work begins
    Start,
    /// Cancel arrived while the work was in flight
    RequestCancel,
    /// Underlying work finished
    Complete,
    /// Cancellation observed at a checkpoint
    Cancel,
    /// Underlying work panicked
    Fail,
}

impl OperationEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::RequestCancel => "request_cancel",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
            Self::Fail => "fail",
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancel | Self::Fail)
    }
}
