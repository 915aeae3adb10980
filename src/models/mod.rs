//! # Models
//!
//! Task records consumed by the dispatcher and the lifecycle state machine.

pub mod task;

pub use task::Task;
