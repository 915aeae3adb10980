//! Proptest strategies for lifecycle events and task states

use proptest::prelude::*;
use tasker_relay::state_machine::{TaskEvent, TaskStatus};

pub fn task_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::ALL.to_vec())
}

pub fn agent_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}"
}

pub fn reason_strategy() -> impl Strategy<Value = String> {
    "[a-z ]{1,24}"
}

pub fn task_event_strategy() -> impl Strategy<Value = TaskEvent> {
    prop_oneof![
        agent_name_strategy().prop_map(TaskEvent::Assign),
        Just(TaskEvent::Start),
        Just(TaskEvent::Complete),
        reason_strategy().prop_map(TaskEvent::Fail),
        reason_strategy().prop_map(TaskEvent::Escalate),
        Just(TaskEvent::Retry),
    ]
}

pub fn event_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<TaskEvent>> {
    prop::collection::vec(task_event_strategy(), 0..max_len)
}
