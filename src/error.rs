//! # Error Handling
//!
//! Crate-wide error aggregating the component errors for callers that want a
//! single type at the application boundary.

use crate::config::ConfigurationError;
use crate::registry::DispatchError;
use crate::resilience::StoreError;
use crate::state_machine::StateMachineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskerError {
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateMachineError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("System context error: {0}")]
    SystemContext(String),
}

pub type Result<T> = std::result::Result<T, TaskerError>;
