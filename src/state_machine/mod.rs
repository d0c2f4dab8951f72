// State machine module for cancellable operations
//
// Pure, in-memory transition table for the lifecycle of a single
// cancellable operation. Guards and side effects live with the operation
// itself; this module only decides which transitions are legal.

pub mod errors;
pub mod events;
pub mod operation_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::OperationEvent;
pub use operation_state_machine::OperationStateMachine;
pub use states::OperationState;
