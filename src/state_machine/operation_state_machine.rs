use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    errors::{StateMachineError, StateMachineResult},
    events::OperationEvent,
    states::OperationState,
};

/// A recorded state change, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTransition {
    pub from_state: OperationState,
    pub to_state: OperationState,
    pub event: OperationEvent,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory state machine for a single cancellable operation
///
/// Not synchronized on its own; the owning operation keeps it behind the
/// same lock that guards its resume token.
#[derive(Debug, Clone, Default)]
pub struct OperationStateMachine {
    current: OperationState,
    transitions: Vec<OperationTransition>,
}

impl OperationStateMachine {
    /// Create a new state machine in the `Pending` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state
    pub fn current_state(&self) -> OperationState {
        self.current
    }

    /// Transitions applied so far
    pub fn transitions(&self) -> &[OperationTransition] {
        &self.transitions
    }

    /// Apply an event, recording the transition on success
    pub fn transition(&mut self, event: OperationEvent) -> StateMachineResult<OperationState> {
        let target_state = Self::determine_target_state(self.current, event)?;

        self.transitions.push(OperationTransition {
            from_state: self.current,
            to_state: target_state,
            event,
            transitioned_at: Utc::now(),
        });
        self.current = target_state;

        Ok(target_state)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: OperationState,
        event: OperationEvent,
    ) -> StateMachineResult<OperationState> {
        let target = match (current_state, event) {
            (OperationState::Pending, OperationEvent::Start) => OperationState::Running,

            (OperationState::Running, OperationEvent::RequestCancel) => {
                OperationState::CancelRequested
            }

            (OperationState::Running, OperationEvent::Complete)
            | (OperationState::CancelRequested, OperationEvent::Complete) => {
                OperationState::Completed
            }

            (OperationState::Pending, OperationEvent::Cancel)
            | (OperationState::CancelRequested, OperationEvent::Cancel) => {
                OperationState::Cancelled
            }

            (OperationState::Running, OperationEvent::Fail)
            | (OperationState::CancelRequested, OperationEvent::Fail) => OperationState::Failed,

            (from_state, event) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }
}
