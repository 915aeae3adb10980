//! # Lifecycle State Machine
//!
//! Explicit `(status, event) -> status` table for task records plus the
//! side-effect actions applied after a successful lookup.

pub mod actions;
pub mod errors;
pub mod events;
pub mod states;
pub mod task_state_machine;

// Re-export main types for convenient access
pub use actions::{TransitionAction, TransitionContext};
pub use errors::{StateMachineError, StateMachineResult};
pub use events::TaskEvent;
pub use states::TaskStatus;
pub use task_state_machine::TaskStateMachine;
