//! # Circuit Breaker Configuration
//!
//! Per-breaker thresholds. File and environment driven settings live in
//! [`crate::config::CircuitBreakerSettings`], which converts into this type.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,

    /// Time to wait in open state before attempting recovery
    pub timeout: Duration,

    /// Number of successful calls in half-open state to close circuit
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    /// Create configuration for external API calls such as vision or extraction services
    pub fn for_external_api() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(45),
            success_threshold: 2,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }

        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }

        if self.success_threshold == 0 {
            return Err("success_threshold must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}
