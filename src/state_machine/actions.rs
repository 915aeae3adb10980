use super::events::TaskEvent;
use super::states::TaskStatus;
use crate::models::Task;
use chrono::{DateTime, Utc};

/// Details of a transition that has already passed the table lookup
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub event: &'a TaskEvent,
    pub occurred_at: DateTime<Utc>,
}

/// Side effect applied to the task record after a successful lookup.
///
/// Actions are infallible: every check that can reject a transition happens
/// before any action runs, so a rejected transition never leaves a partially
/// mutated record behind.
pub trait TransitionAction: Send + Sync {
    fn execute(&self, task: &mut Task, transition: &TransitionContext<'_>);

    /// Get a description of this action for logging
    fn description(&self) -> &'static str;
}

/// Records the agent named by an `assign` event
pub struct AssignHandlerAction;

impl TransitionAction for AssignHandlerAction {
    fn execute(&self, task: &mut Task, transition: &TransitionContext<'_>) {
        if let TaskEvent::Assign(agent) = transition.event {
            task.assigned_handler = Some(agent.clone());
        }
    }

    fn description(&self) -> &'static str {
        "Record assigned handler"
    }
}

/// Stamps `completed_at` when a task reaches `Completed`
pub struct StampCompletionAction;

impl TransitionAction for StampCompletionAction {
    fn execute(&self, task: &mut Task, transition: &TransitionContext<'_>) {
        if transition.to == TaskStatus::Completed {
            task.completed_at = Some(transition.occurred_at);
        }
    }

    fn description(&self) -> &'static str {
        "Stamp completion time"
    }
}

/// Clears ownership and completion fields when a failed task is retried
pub struct RetryResetAction;

impl TransitionAction for RetryResetAction {
    fn execute(&self, task: &mut Task, transition: &TransitionContext<'_>) {
        if transition.from == TaskStatus::Failed && transition.to == TaskStatus::Pending {
            task.assigned_handler = None;
            task.completed_at = None;
        }
    }

    fn description(&self) -> &'static str {
        "Reset task for retry"
    }
}

/// The side effects every state machine runs, in order
pub fn default_actions() -> Vec<Box<dyn TransitionAction>> {
    vec![
        Box::new(AssignHandlerAction),
        Box::new(StampCompletionAction),
        Box::new(RetryResetAction),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(from: TaskStatus, to: TaskStatus, event: &TaskEvent) -> TransitionContext<'_> {
        TransitionContext {
            from,
            to,
            event,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_assign_action_only_reacts_to_assign() {
        let mut task = Task::new("ocr");
        let start = TaskEvent::Start;
        AssignHandlerAction.execute(
            &mut task,
            &context(TaskStatus::Assigned, TaskStatus::InProgress, &start),
        );
        assert!(task.assigned_handler.is_none());

        let assign = TaskEvent::assign("agentA");
        AssignHandlerAction.execute(
            &mut task,
            &context(TaskStatus::Pending, TaskStatus::Assigned, &assign),
        );
        assert_eq!(task.assigned_handler.as_deref(), Some("agentA"));
    }

    #[test]
    fn test_stamp_completion_uses_transition_time() {
        let mut task = Task::new("ocr");
        let event = TaskEvent::Complete;
        let ctx = context(TaskStatus::InProgress, TaskStatus::Completed, &event);

        StampCompletionAction.execute(&mut task, &ctx);
        assert_eq!(task.completed_at, Some(ctx.occurred_at));
    }

    #[test]
    fn test_retry_reset_clears_fields() {
        let mut task = Task::new("ocr");
        task.assigned_handler = Some("agentA".to_string());
        task.completed_at = Some(Utc::now());

        let event = TaskEvent::Retry;
        RetryResetAction.execute(
            &mut task,
            &context(TaskStatus::Failed, TaskStatus::Pending, &event),
        );
        assert!(task.assigned_handler.is_none());
        assert!(task.completed_at.is_none());
    }
}
