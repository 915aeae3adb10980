//! # Handler Registry
//!
//! Tagged dispatch table from task-type strings to [`TaskHandler`]
//! implementations.

pub mod handler;
pub mod task_dispatcher;

pub use handler::{handler_fn, FnHandler, TaskHandler};
pub use task_dispatcher::{DispatchError, TaskDispatcher};
