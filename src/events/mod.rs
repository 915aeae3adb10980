//! # Events
//!
//! Optional observability sink shared by the dispatcher, the lifecycle state
//! machine and the circuit breakers.

pub mod publisher;

pub use publisher::{EventPublisher, PublishedEvent};

/// Names of the structured events emitted by this crate
pub mod names {
    pub const HANDLER_REGISTERED: &str = "handler_registered";
    pub const TASK_DISPATCHED: &str = "task_dispatched";
    pub const DISPATCH_FAILED: &str = "dispatch_failed";
    pub const TRANSITION_APPLIED: &str = "transition_applied";
    pub const TRANSITION_REJECTED: &str = "transition_rejected";
    pub const CIRCUIT_OPENED: &str = "circuit_opened";
    pub const CIRCUIT_HALF_OPEN: &str = "circuit_half_open";
    pub const CIRCUIT_CLOSED: &str = "circuit_closed";
    pub const CIRCUIT_REJECTED: &str = "circuit_rejected";
}
