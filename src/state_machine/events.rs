use serde::{Deserialize, Serialize};

/// Events that can trigger task status transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Hand the task to the named agent
    Assign(String),
    /// Begin processing
    Start,
    /// Mark task as complete
    Complete,
    /// Mark task as failed with a reason
    Fail(String),
    /// Escalate the task for manual attention with a reason
    Escalate(String),
    /// Return a failed task to the pending queue
    Retry,
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Assign(_) => "assign",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Escalate(_) => "escalate",
            Self::Retry => "retry",
        }
    }

    /// Reason attached to a fail or escalate event
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Fail(reason) | Self::Escalate(reason) => Some(reason),
            _ => None,
        }
    }

    /// Agent named by an assign event
    pub fn agent(&self) -> Option<&str> {
        match self {
            Self::Assign(agent) => Some(agent),
            _ => None,
        }
    }

    pub fn assign(agent: impl Into<String>) -> Self {
        Self::Assign(agent.into())
    }

    pub fn fail_with_reason(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }

    pub fn escalate_with_reason(reason: impl Into<String>) -> Self {
        Self::Escalate(reason.into())
    }
}
