//! # System Context
//!
//! Dependency injection container wiring the dispatcher, the lifecycle state
//! machine and the circuit breaker manager to one configuration, one shared
//! state store and one event publisher.
//!
//! Handlers can only be registered on the [`SystemContextBuilder`]; once built,
//! the dispatcher is shared read-only. Every built context is independent, so
//! tests can construct as many isolated contexts as they need. A single
//! process-wide context may additionally be installed with
//! [`SystemContext::install_global`].

use crate::config::ConfigManager;
use crate::error::{Result, TaskerError};
use crate::events::{EventPublisher, PublishedEvent};
use crate::models::Task;
use crate::registry::{TaskDispatcher, TaskHandler};
use crate::resilience::{CircuitBreaker, CircuitBreakerManager, SharedStateStore};
use crate::state_machine::{StateMachineResult, TaskEvent, TaskStateMachine, TaskStatus};
use mockable::{Clock, DefaultClock};
use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

static GLOBAL_CONTEXT: OnceLock<Arc<SystemContext>> = OnceLock::new();

/// Shared system dependencies and configuration
pub struct SystemContext {
    /// System instance ID
    pub system_id: Uuid,

    pub config_manager: Arc<ConfigManager>,

    /// Handler registry, frozen after startup
    pub dispatcher: Arc<TaskDispatcher>,

    pub state_machine: Arc<TaskStateMachine>,

    pub circuit_breaker_manager: Arc<CircuitBreakerManager>,

    pub event_publisher: EventPublisher,
}

impl std::fmt::Debug for SystemContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemContext")
            .field("system_id", &self.system_id)
            .field("environment", &self.config_manager.environment())
            .field("registered_types", &self.dispatcher.registered_types())
            .field("circuit_breaker_manager", &self.circuit_breaker_manager)
            .finish()
    }
}

/// Startup-phase builder; the only place handlers can be registered
pub struct SystemContextBuilder {
    config_manager: Arc<ConfigManager>,
    store: Arc<dyn SharedStateStore>,
    clock: Arc<dyn Clock + Send + Sync>,
    event_publisher: EventPublisher,
    dispatcher: TaskDispatcher,
}

impl SystemContextBuilder {
    /// Register a handler for a task type
    pub fn register_handler<H>(mut self, task_type: &str, handler: H) -> Result<Self>
    where
        H: TaskHandler + 'static,
    {
        self.dispatcher.register(task_type, handler)?;
        Ok(self)
    }

    /// Subscribe to the context's events before any handler is registered,
    /// so startup events such as `handler_registered` are not missed
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.event_publisher.subscribe()
    }

    /// Clock used for completion stamps and breaker timeouts
    pub fn clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> SystemContext {
        let config = self.config_manager.config();

        let state_machine = TaskStateMachine::with_clock(Arc::clone(&self.clock))
            .with_event_publisher(self.event_publisher.clone());
        let circuit_breaker_manager =
            CircuitBreakerManager::new(config.circuit_breakers.clone(), self.store)
                .with_clock(self.clock)
                .with_event_publisher(self.event_publisher.clone());

        let context = SystemContext {
            system_id: Uuid::new_v4(),
            dispatcher: Arc::new(self.dispatcher),
            state_machine: Arc::new(state_machine),
            circuit_breaker_manager: Arc::new(circuit_breaker_manager),
            event_publisher: self.event_publisher,
            config_manager: self.config_manager,
        };

        info!(
            system_id = %context.system_id,
            environment = %context.config_manager.environment(),
            handlers = context.dispatcher.len(),
            "🔧 System context initialized"
        );
        context
    }
}

impl SystemContext {
    /// Start building a context from loaded configuration and a shared store
    pub fn builder(
        config_manager: Arc<ConfigManager>,
        store: Arc<dyn SharedStateStore>,
    ) -> SystemContextBuilder {
        let event_publisher = EventPublisher::new(config_manager.config().events.channel_capacity);
        SystemContextBuilder {
            dispatcher: TaskDispatcher::with_event_publisher(event_publisher.clone()),
            config_manager,
            store,
            clock: Arc::new(DefaultClock),
            event_publisher,
        }
    }

    /// Install the process-wide context. Succeeds at most once.
    pub fn install_global(context: SystemContext) -> Result<Arc<SystemContext>> {
        let context = Arc::new(context);
        GLOBAL_CONTEXT.set(Arc::clone(&context)).map_err(|_| {
            TaskerError::SystemContext("global system context already installed".to_string())
        })?;
        info!(system_id = %context.system_id, "Global system context installed");
        Ok(context)
    }

    /// The process-wide context, if one was installed
    pub fn global() -> Option<Arc<SystemContext>> {
        GLOBAL_CONTEXT.get().cloned()
    }

    /// Route a task to its registered handler
    pub async fn dispatch(&self, task: &Task) -> anyhow::Result<()> {
        self.dispatcher.dispatch(task).await
    }

    /// Apply a lifecycle event to a task record
    pub fn transition(&self, task: &mut Task, event: TaskEvent) -> StateMachineResult<TaskStatus> {
        self.state_machine.transition(task, event)
    }

    /// Named circuit breaker backed by the shared store
    pub async fn circuit_breaker(&self, name: &str) -> CircuitBreaker {
        self.circuit_breaker_manager.get_circuit_breaker(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::resilience::{CircuitState, InMemoryStateStore};
    use crate::registry::DispatchError;
    use crate::test_helpers::{ManualClock, RecordingHandler};

    fn builder() -> SystemContextBuilder {
        let config_manager = ConfigManager::from_config(RelayConfig::default()).unwrap();
        SystemContext::builder(config_manager, Arc::new(InMemoryStateStore::new()))
    }

    #[tokio::test]
    async fn test_context_wires_components() {
        let handler = RecordingHandler::new();
        let context = builder()
            .register_handler("ocr", handler.clone())
            .unwrap()
            .clock(Arc::new(ManualClock::default()))
            .build();

        let mut task = Task::new("ocr");
        context.transition(&mut task, TaskEvent::assign("worker-1")).unwrap();
        context.dispatch(&task).await.unwrap();

        assert_eq!(handler.invocation_count(), 1);
        assert_eq!(handler.received()[0].status, TaskStatus::Assigned);

        let breaker = context.circuit_breaker("vision").await;
        assert_eq!(breaker.current_state().await.unwrap(), CircuitState::Closed);
        assert_eq!(breaker.config().failure_threshold, 5);
    }

    #[test]
    fn test_empty_task_type_fails_registration() {
        let result = builder().register_handler("", RecordingHandler::new());
        assert!(matches!(
            result,
            Err(TaskerError::Dispatch(DispatchError::EmptyTaskType))
        ));
    }

    #[test]
    fn test_startup_events_reach_early_subscribers() {
        let builder = builder();
        let mut events = builder.subscribe();
        let context = builder
            .register_handler("ocr", RecordingHandler::new())
            .unwrap()
            .build();

        let registered = events.try_recv().unwrap();
        assert_eq!(registered.name, crate::events::names::HANDLER_REGISTERED);
        assert_eq!(registered.context["task_type"], "ocr");

        // Same channel as the built context
        context.event_publisher.publish("custom", serde_json::json!({}));
        assert_eq!(events.try_recv().unwrap().name, "custom");
    }

    #[tokio::test]
    async fn test_contexts_are_isolated() {
        let first = builder().register_handler("ocr", RecordingHandler::new()).unwrap().build();
        let second = builder().build();

        assert!(first.dispatcher.is_registered("ocr"));
        assert!(!second.dispatcher.is_registered("ocr"));

        let breaker = first.circuit_breaker("vision").await;
        breaker.force_open().await.unwrap();
        let other = second.circuit_breaker("vision").await;
        assert_eq!(other.current_state().await.unwrap(), CircuitState::Closed);
    }

    #[test]
    fn test_global_context_installs_once() {
        let installed = SystemContext::install_global(builder().build()).unwrap();
        let fetched = SystemContext::global().unwrap();
        assert_eq!(installed.system_id, fetched.system_id);

        assert!(SystemContext::install_global(builder().build()).is_err());
    }
}
