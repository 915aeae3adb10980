//! # Task Model
//!
//! In-memory task record routed by the dispatcher and mutated by the
//! lifecycle state machine.
//!
//! Persistence is owned by the caller: this crate only reads `task_type` for
//! routing and mutates `status`, `assigned_handler` and `completed_at` as the
//! side effects of validated transitions.

use crate::state_machine::states::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A unit of work with its lifecycle fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    /// Routing key used to resolve the registered handler
    pub task_type: String,
    /// Opaque payload handed to the handler
    pub context: Value,
    pub status: TaskStatus,
    pub assigned_handler: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task with an empty context
    pub fn new(task_type: impl Into<String>) -> Self {
        Self::with_context(task_type, Value::Object(serde_json::Map::new()))
    }

    /// Create a new pending task carrying the given context
    pub fn with_context(task_type: impl Into<String>, context: Value) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            task_type: task_type.into(),
            context,
            status: TaskStatus::default(),
            assigned_handler: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
