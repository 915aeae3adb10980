//! # Task Dispatcher
//!
//! Routes a task to the handler registered for its `task_type`.
//!
//! ## Usage
//!
//! ```rust
//! use tasker_relay::models::Task;
//! use tasker_relay::registry::{handler_fn, TaskDispatcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut dispatcher = TaskDispatcher::new();
//! dispatcher.register("ocr", handler_fn(|_task| async { Ok(()) }))?;
//!
//! dispatcher.dispatch(&Task::new("ocr")).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Registration takes `&mut self` and dispatch takes `&self`: register every
//! handler during startup, then share the dispatcher (for example behind an
//! `Arc`) for concurrent dispatch.

use super::handler::TaskHandler;
use crate::events::{names, EventPublisher};
use crate::models::Task;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Errors returned by registration and dispatch
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Handlers must be registered under a non-empty task type
    #[error("Task type must not be empty")]
    EmptyTaskType,

    /// No handler is registered for the task's type; nothing was invoked
    #[error("No handler registered for task type '{task_type}'")]
    NoHandler { task_type: String },
}

/// Registry of handlers keyed by task type
pub struct TaskDispatcher {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    event_publisher: Option<EventPublisher>,
}

impl TaskDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            event_publisher: None,
        }
    }

    /// Create an empty dispatcher that publishes dispatch events
    pub fn with_event_publisher(event_publisher: EventPublisher) -> Self {
        Self {
            handlers: HashMap::new(),
            event_publisher: Some(event_publisher),
        }
    }

    /// Register a handler for a task type, replacing any existing one
    pub fn register<H>(&mut self, task_type: impl Into<String>, handler: H) -> Result<(), DispatchError>
    where
        H: TaskHandler + 'static,
    {
        self.register_shared(task_type, Arc::new(handler))
    }

    /// Register an already shared handler for a task type
    pub fn register_shared(
        &mut self,
        task_type: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), DispatchError> {
        let task_type = task_type.into();
        if task_type.is_empty() {
            return Err(DispatchError::EmptyTaskType);
        }

        let replaced = self.handlers.insert(task_type.clone(), handler).is_some();
        if replaced {
            warn!(task_type = %task_type, "⚠️ Overwriting existing handler registration");
        } else {
            info!(task_type = %task_type, "📝 Handler registered");
        }

        self.publish(
            names::HANDLER_REGISTERED,
            json!({ "task_type": task_type, "replaced": replaced }),
        );
        Ok(())
    }

    /// Remove the handler for a task type, returning whether one existed
    pub fn unregister(&mut self, task_type: &str) -> bool {
        let removed = self.handlers.remove(task_type).is_some();
        if removed {
            info!(task_type = %task_type, "Handler unregistered");
        }
        removed
    }

    pub fn is_registered(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    /// Registered task types in sorted order
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke the handler registered for `task.task_type` exactly once.
    ///
    /// Fails with [`DispatchError::NoHandler`] without invoking anything when
    /// the type is unknown; callers tell it apart with
    /// `err.downcast_ref::<DispatchError>()`. A handler's error is returned as
    /// the same object the handler produced.
    pub async fn dispatch(&self, task: &Task) -> anyhow::Result<()> {
        let Some(handler) = self.handlers.get(&task.task_type) else {
            warn!(
                task_id = %task.task_id,
                task_type = %task.task_type,
                "❌ No handler registered for task type"
            );
            self.publish(
                names::DISPATCH_FAILED,
                json!({
                    "task_id": task.task_id,
                    "task_type": task.task_type,
                    "error": "no_handler",
                }),
            );
            return Err(DispatchError::NoHandler {
                task_type: task.task_type.clone(),
            }
            .into());
        };

        debug!(task_id = %task.task_id, task_type = %task.task_type, "🎯 Dispatching task");
        self.publish(
            names::TASK_DISPATCHED,
            json!({ "task_id": task.task_id, "task_type": task.task_type }),
        );

        handler.handle(task).await.inspect_err(|err| {
            warn!(
                task_id = %task.task_id,
                task_type = %task.task_type,
                error = %err,
                "Task handler returned an error"
            );
            self.publish(
                names::DISPATCH_FAILED,
                json!({
                    "task_id": task.task_id,
                    "task_type": task.task_type,
                    "error": err.to_string(),
                }),
            );
        })
    }

    fn publish(&self, event_name: &str, context: serde_json::Value) {
        if let Some(publisher) = &self.event_publisher {
            publisher.publish(event_name, context);
        }
    }
}

impl Default for TaskDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDispatcher")
            .field("registered_types", &self.registered_types())
            .field("event_publisher", &self.event_publisher.is_some())
            .finish()
    }
}
