#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Relay
//!
//! Task routing and fault isolation for async workers.
//!
//! ## Overview
//!
//! Tasker Relay bundles three cooperating pieces that sit between a task source and the
//! agents doing the work:
//!
//! - A **dispatcher** that routes each task to the handler registered for its type
//! - A **lifecycle state machine** that moves task records through
//!   `pending -> assigned -> in_progress -> completed | failed | escalated`
//! - A **circuit breaker** whose state lives in a shared key-value store, so every
//!   process watching the same dependency sees the same open/closed decision
//!
//! ## Module Organization
//!
//! - [`models`] - Task record
//! - [`state_machine`] - Task lifecycle states, events and transition actions
//! - [`registry`] - Handler trait and task dispatcher
//! - [`resilience`] - Shared-state circuit breakers and their registry
//! - [`events`] - Broadcast event publisher
//! - [`config`] - Configuration loading
//! - [`system_context`] - Wiring of all components for a running process
//! - [`error`] - Top-level error type
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tasker_relay::config::ConfigManager;
//! use tasker_relay::models::Task;
//! use tasker_relay::registry::handler_fn;
//! use tasker_relay::resilience::InMemoryStateStore;
//! use tasker_relay::state_machine::TaskEvent;
//! use tasker_relay::system_context::SystemContext;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! tasker_relay::logging::init_structured_logging();
//!
//! let context = SystemContext::builder(ConfigManager::load()?, Arc::new(InMemoryStateStore::new()))
//!     .register_handler("summarize", handler_fn(|task| async move {
//!         println!("summarizing {}", task.task_id);
//!         Ok::<(), anyhow::Error>(())
//!     }))?
//!     .build();
//!
//! let mut task = Task::new("summarize");
//! context.transition(&mut task, TaskEvent::assign("agent-a"))?;
//! context.dispatch(&task).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod registry;
pub mod resilience;
pub mod state_machine;
pub mod system_context;
pub mod test_helpers;

pub use config::{ConfigManager, ConfigurationError, RelayConfig};
pub use error::{Result, TaskerError};
pub use events::{EventPublisher, PublishedEvent};
pub use models::Task;
pub use registry::{handler_fn, DispatchError, TaskDispatcher, TaskHandler};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerManager,
    CircuitState, InMemoryStateStore, SharedStateStore, StoreError,
};
pub use state_machine::{StateMachineError, TaskEvent, TaskStateMachine, TaskStatus};
pub use system_context::{SystemContext, SystemContextBuilder};
