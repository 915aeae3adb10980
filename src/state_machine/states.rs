use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Initial state when task is created or retried
    #[default]
    Pending,
    /// A handler has been chosen for the task
    Assigned,
    /// Task is currently being executed
    InProgress,
    /// Task completed successfully
    Completed,
    /// Task failed and may be retried
    Failed,
    /// Task was handed off for manual attention
    Escalated,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        Self::Pending,
        Self::Assigned,
        Self::InProgress,
        Self::Completed,
        Self::Failed,
        Self::Escalated,
    ];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Escalated)
    }

    /// Check if this is an error state that may allow recovery
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Check if a handler currently owns the task
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Escalated => "escalated",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "assigned" => Ok(Self::Assigned),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "escalated" => Ok(Self::Escalated),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}
