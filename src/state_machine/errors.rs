use super::states::TaskStatus;
use thiserror::Error;

/// Errors raised by lifecycle transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    /// The (current status, event) pair is not in the transition table
    #[error("Transition not allowed: cannot apply '{event}' to a task in status '{current}'")]
    TransitionNotAllowed {
        current: TaskStatus,
        event: &'static str,
    },
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;
