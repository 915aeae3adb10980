//! # Circuit Breaker Metrics
//!
//! Process-local call accounting. These counters describe what this process
//! observed; the shared store remains the source of truth for breaker state.

use crate::resilience::CircuitState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics snapshot for a single circuit breaker instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Number of times the wrapped operation was invoked
    pub total_calls: u64,

    pub success_count: u64,

    pub failure_count: u64,

    /// Calls rejected while open, without invoking the operation
    pub rejected_count: u64,

    /// Total duration of all invoked operations
    pub total_duration: Duration,

    /// State observed by the most recent call in this process
    pub last_observed_state: CircuitState,

    /// Calculated failure rate (0.0 to 1.0)
    pub failure_rate: f64,

    /// Average operation duration
    pub average_duration: Duration,
}

impl CircuitBreakerMetrics {
    /// Get human-readable state description
    pub fn state_description(&self) -> &'static str {
        match self.last_observed_state {
            CircuitState::Closed => "Healthy - Normal operation",
            CircuitState::Open => "Failing - Rejecting all calls",
            CircuitState::HalfOpen => "Recovering - Testing system health",
        }
    }

    /// Format metrics for logging
    pub fn format_summary(&self) -> String {
        format!(
            "State: {} | Calls: {} | Failures: {} | Rejected: {} | Avg Duration: {}ms",
            self.state_description(),
            self.total_calls,
            self.failure_count,
            self.rejected_count,
            self.average_duration.as_millis()
        )
    }
}

/// Lock-free counters updated on every call
#[derive(Debug, Default)]
pub(crate) struct AtomicCircuitBreakerMetrics {
    total_calls: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    rejected_count: AtomicU64,
    total_duration_nanos: AtomicU64,
    last_observed_state: AtomicU64,
}

impl AtomicCircuitBreakerMetrics {
    pub(crate) fn record_success(&self, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.add_duration(duration);
    }

    pub(crate) fn record_failure(&self, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.add_duration(duration);
    }

    pub(crate) fn record_rejection(&self) {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn observe_state(&self, state: CircuitState) {
        self.last_observed_state
            .store(state as u8 as u64, Ordering::Relaxed);
    }

    fn add_duration(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.total_duration_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CircuitBreakerMetrics {
        let total_calls = self.total_calls.load(Ordering::Relaxed);
        let success_count = self.success_count.load(Ordering::Relaxed);
        let failure_count = self.failure_count.load(Ordering::Relaxed);
        let total_duration_nanos = self.total_duration_nanos.load(Ordering::Relaxed);
        let state = self.last_observed_state.load(Ordering::Relaxed);

        let (failure_rate, average_duration) = if total_calls > 0 {
            (
                failure_count as f64 / total_calls as f64,
                Duration::from_nanos(total_duration_nanos / total_calls),
            )
        } else {
            (0.0, Duration::ZERO)
        };

        CircuitBreakerMetrics {
            total_calls,
            success_count,
            failure_count,
            rejected_count: self.rejected_count.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(total_duration_nanos),
            last_observed_state: CircuitState::from(u8::try_from(state).unwrap_or(u8::MAX)),
            failure_rate,
            average_duration,
        }
    }
}

/// System-wide circuit breaker metrics aggregator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemCircuitBreakerMetrics {
    /// Metrics for individual circuit breakers by name
    pub circuit_breakers: HashMap<String, CircuitBreakerMetrics>,
}

impl SystemCircuitBreakerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add metrics for a circuit breaker
    pub fn add_circuit_breaker(&mut self, name: String, metrics: CircuitBreakerMetrics) {
        self.circuit_breakers.insert(name, metrics);
    }

    /// Total rejected calls across every breaker
    pub fn total_rejections(&self) -> u64 {
        self.circuit_breakers
            .values()
            .map(|metrics| metrics.rejected_count)
            .sum()
    }
}
