use super::{
    actions::{default_actions, TransitionAction, TransitionContext},
    errors::{StateMachineError, StateMachineResult},
    events::TaskEvent,
    states::TaskStatus,
};
use crate::events::{names, EventPublisher};
use crate::models::Task;
use mockable::{Clock, DefaultClock};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle state machine for task records.
///
/// The transition table in [`TaskStateMachine::determine_target_state`] is the
/// entire algorithm. The machine holds no per-task state: the task's `status`
/// field is the only state, and callers own the serialization of concurrent
/// transitions on the same task.
pub struct TaskStateMachine {
    actions: Vec<Box<dyn TransitionAction>>,
    clock: Arc<dyn Clock + Send + Sync>,
    event_publisher: Option<EventPublisher>,
}

impl TaskStateMachine {
    /// Create a state machine using the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }

    /// Create a state machine stamping completion times from the given clock
    pub fn with_clock(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            actions: default_actions(),
            clock,
            event_publisher: None,
        }
    }

    /// Attach an event publisher for `transition_applied` / `transition_rejected`
    pub fn with_event_publisher(mut self, event_publisher: EventPublisher) -> Self {
        self.event_publisher = Some(event_publisher);
        self
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current: TaskStatus,
        event: &TaskEvent,
    ) -> StateMachineResult<TaskStatus> {
        let target = match (current, event) {
            (TaskStatus::Pending, TaskEvent::Assign(_)) => TaskStatus::Assigned,
            (TaskStatus::Assigned, TaskEvent::Start) => TaskStatus::InProgress,
            (TaskStatus::InProgress, TaskEvent::Complete) => TaskStatus::Completed,

            (TaskStatus::Assigned | TaskStatus::InProgress, TaskEvent::Fail(_)) => {
                TaskStatus::Failed
            }
            (TaskStatus::Assigned | TaskStatus::InProgress, TaskEvent::Escalate(_)) => {
                TaskStatus::Escalated
            }

            (TaskStatus::Failed, TaskEvent::Retry) => TaskStatus::Pending,

            (current, event) => {
                return Err(StateMachineError::TransitionNotAllowed {
                    current,
                    event: event.event_type(),
                })
            }
        };

        Ok(target)
    }

    /// Check whether an event is accepted from the given state
    pub fn can_transition(current: TaskStatus, event: &TaskEvent) -> bool {
        Self::determine_target_state(current, event).is_ok()
    }

    /// Event types accepted from the given state
    pub fn allowed_events(current: TaskStatus) -> Vec<&'static str> {
        let probes = [
            TaskEvent::Assign(String::new()),
            TaskEvent::Start,
            TaskEvent::Complete,
            TaskEvent::Fail(String::new()),
            TaskEvent::Escalate(String::new()),
            TaskEvent::Retry,
        ];

        probes
            .iter()
            .filter(|event| Self::can_transition(current, event))
            .map(TaskEvent::event_type)
            .collect()
    }

    /// Apply an event to the task.
    ///
    /// On rejection the task is left untouched. On success the side-effect
    /// actions run and then `status` is updated, all before returning.
    pub fn transition(&self, task: &mut Task, event: TaskEvent) -> StateMachineResult<TaskStatus> {
        let from = task.status;
        let to = match Self::determine_target_state(from, &event) {
            Ok(to) => to,
            Err(err) => {
                warn!(
                    task_id = %task.task_id,
                    current = %from,
                    event = event.event_type(),
                    "⛔ Task transition rejected"
                );
                self.publish(
                    names::TRANSITION_REJECTED,
                    json!({
                        "task_id": task.task_id,
                        "current": from,
                        "event": event.event_type(),
                    }),
                );
                return Err(err);
            }
        };

        let transition = TransitionContext {
            from,
            to,
            event: &event,
            occurred_at: self.clock.utc(),
        };

        for action in &self.actions {
            action.execute(task, &transition);
            debug!(task_id = %task.task_id, action = action.description(), "Transition action applied");
        }
        task.status = to;

        debug!(
            task_id = %task.task_id,
            from = %from,
            to = %to,
            event = event.event_type(),
            reason = event.reason(),
            "🔄 Task transition applied"
        );
        self.publish(
            names::TRANSITION_APPLIED,
            json!({
                "task_id": task.task_id,
                "from": from,
                "to": to,
                "event": event.event_type(),
                "reason": event.reason(),
            }),
        );

        Ok(to)
    }

    fn publish(&self, event_name: &str, context: serde_json::Value) {
        if let Some(publisher) = &self.event_publisher {
            publisher.publish(event_name, context);
        }
    }
}

impl Default for TaskStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStateMachine")
            .field(
                "actions",
                &self.actions.iter().map(|a| a.description()).collect::<Vec<_>>(),
            )
            .field("event_publisher", &self.event_publisher.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ManualClock;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_state_transitions() {
        assert_eq!(
            TaskStateMachine::determine_target_state(TaskStatus::Pending, &TaskEvent::assign("a"))
                .unwrap(),
            TaskStatus::Assigned
        );
        assert_eq!(
            TaskStateMachine::determine_target_state(TaskStatus::Assigned, &TaskEvent::Start)
                .unwrap(),
            TaskStatus::InProgress
        );
        assert_eq!(
            TaskStateMachine::determine_target_state(TaskStatus::InProgress, &TaskEvent::Complete)
                .unwrap(),
            TaskStatus::Completed
        );
        assert_eq!(
            TaskStateMachine::determine_target_state(
                TaskStatus::Assigned,
                &TaskEvent::escalate_with_reason("sla")
            )
            .unwrap(),
            TaskStatus::Escalated
        );
    }

    #[test]
    fn test_invalid_transitions() {
        // Cannot start from pending state
        assert_eq!(
            TaskStateMachine::determine_target_state(TaskStatus::Pending, &TaskEvent::Start),
            Err(StateMachineError::TransitionNotAllowed {
                current: TaskStatus::Pending,
                event: "start",
            })
        );

        // Pending tasks cannot fail before they are assigned
        assert!(!TaskStateMachine::can_transition(
            TaskStatus::Pending,
            &TaskEvent::fail_with_reason("x")
        ));
    }

    #[test]
    fn test_terminal_states_have_no_outgoing_transitions() {
        for status in TaskStatus::ALL {
            let allowed = TaskStateMachine::allowed_events(status);
            assert_eq!(allowed.is_empty(), status.is_terminal(), "{status}");
        }
        assert_eq!(
            TaskStateMachine::allowed_events(TaskStatus::InProgress),
            vec!["complete", "fail", "escalate"]
        );
    }

    #[test]
    fn test_complete_stamps_clock_time() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let machine = TaskStateMachine::with_clock(Arc::new(ManualClock::new(at)));
        let mut task = Task::new("extraction");

        machine.transition(&mut task, TaskEvent::assign("agentA")).unwrap();
        machine.transition(&mut task, TaskEvent::Start).unwrap();
        let status = machine.transition(&mut task, TaskEvent::Complete).unwrap();

        assert_eq!(status, TaskStatus::Completed);
        assert_eq!(task.completed_at, Some(at));
        assert_eq!(task.assigned_handler.as_deref(), Some("agentA"));
    }

    #[test]
    fn test_rejected_transition_leaves_task_unchanged() {
        let machine = TaskStateMachine::new();
        let mut task = Task::new("extraction");
        machine.transition(&mut task, TaskEvent::assign("agentA")).unwrap();
        let before = task.clone();

        let err = machine.transition(&mut task, TaskEvent::Retry).unwrap_err();

        assert_eq!(
            err,
            StateMachineError::TransitionNotAllowed {
                current: TaskStatus::Assigned,
                event: "retry",
            }
        );
        assert_eq!(task, before);
    }

    #[tokio::test]
    async fn test_transition_events_are_published() {
        let publisher = EventPublisher::new(16);
        let mut receiver = publisher.subscribe();
        let machine = TaskStateMachine::new().with_event_publisher(publisher);
        let mut task = Task::new("extraction");

        machine.transition(&mut task, TaskEvent::assign("agentA")).unwrap();
        let _ = machine.transition(&mut task, TaskEvent::Complete);

        let applied = receiver.recv().await.unwrap();
        assert_eq!(applied.name, names::TRANSITION_APPLIED);
        assert_eq!(applied.context["to"], "assigned");

        let rejected = receiver.recv().await.unwrap();
        assert_eq!(rejected.name, names::TRANSITION_REJECTED);
        assert_eq!(rejected.context["event"], "complete");
    }
}
