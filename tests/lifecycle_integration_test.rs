//! Task lifecycle driven through a full system context

mod common;

use std::time::Duration;
use tasker_relay::events::names;
use tasker_relay::models::Task;
use tasker_relay::state_machine::{StateMachineError, TaskEvent, TaskStateMachine, TaskStatus};

#[test]
fn test_failed_task_retries_from_pending() {
    let (builder, _, _) = common::context_builder();
    let context = builder.build();
    let mut task = Task::new("translate");

    assert_eq!(
        context.transition(&mut task, TaskEvent::assign("agentA")).unwrap(),
        TaskStatus::Assigned
    );
    assert_eq!(task.assigned_handler.as_deref(), Some("agentA"));

    context.transition(&mut task, TaskEvent::Start).unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);

    context
        .transition(&mut task, TaskEvent::fail_with_reason("timeout"))
        .unwrap();
    assert_eq!(task.status, TaskStatus::Failed);

    context.transition(&mut task, TaskEvent::Retry).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.assigned_handler, None);
    assert_eq!(task.completed_at, None);

    // A retried task walks the same path again
    context.transition(&mut task, TaskEvent::assign("agentB")).unwrap();
    assert_eq!(task.assigned_handler.as_deref(), Some("agentB"));
}

#[test]
fn test_completion_is_stamped_with_context_clock() {
    let (builder, _, clock) = common::context_builder();
    let context = builder.build();
    let mut task = Task::new("translate");

    context.transition(&mut task, TaskEvent::assign("agentA")).unwrap();
    context.transition(&mut task, TaskEvent::Start).unwrap();
    clock.advance(Duration::from_secs(90));
    context.transition(&mut task, TaskEvent::Complete).unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.completed_at, Some(clock.now()));
    assert!(task.is_terminal());
}

#[test]
fn test_terminal_states_reject_every_event() {
    let machine = TaskStateMachine::new();
    for terminal in [TaskStatus::Completed, TaskStatus::Escalated] {
        assert!(TaskStateMachine::allowed_events(terminal).is_empty());

        let mut task = Task::new("review");
        task.status = terminal;
        let before = task.clone();

        let err = machine.transition(&mut task, TaskEvent::Retry).unwrap_err();
        assert_eq!(
            err,
            StateMachineError::TransitionNotAllowed {
                current: terminal,
                event: "retry",
            }
        );
        assert_eq!(task, before);
    }
}

#[test]
fn test_escalation_from_assigned() {
    let machine = TaskStateMachine::new();
    let mut task = Task::new("review");

    machine.transition(&mut task, TaskEvent::assign("agentA")).unwrap();
    machine
        .transition(&mut task, TaskEvent::escalate_with_reason("needs human"))
        .unwrap();

    assert_eq!(task.status, TaskStatus::Escalated);
    assert_eq!(task.assigned_handler.as_deref(), Some("agentA"));
    assert!(task.completed_at.is_none());
}

#[test]
fn test_transitions_are_published_on_context_channel() {
    let (builder, _, _) = common::context_builder();
    let context = builder.build();
    let mut events = context.event_publisher.subscribe();
    let mut task = Task::new("translate");

    context.transition(&mut task, TaskEvent::assign("agentA")).unwrap();
    let _ = context.transition(&mut task, TaskEvent::Complete);

    let applied = events.try_recv().unwrap();
    assert_eq!(applied.name, names::TRANSITION_APPLIED);
    assert_eq!(applied.context["from"], "pending");
    assert_eq!(applied.context["to"], "assigned");

    let rejected = events.try_recv().unwrap();
    assert_eq!(rejected.name, names::TRANSITION_REJECTED);
    assert_eq!(rejected.context["current"], "assigned");
    assert_eq!(rejected.context["event"], "complete");
}
