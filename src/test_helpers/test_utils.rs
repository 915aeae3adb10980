//! # Test Utilities
//!
//! Fixtures for exercising the dispatcher, state machine and circuit breakers
//! without wall-clock sleeps or external services.

use crate::models::Task;
use crate::registry::TaskHandler;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, SharedStateStore};
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Instant a [`ManualClock::default`] starts at: 2026-01-01T00:00:00Z
pub const MANUAL_CLOCK_START: i64 = 1_767_225_600;

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        let mut now = self.now.lock();
        *now += delta;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        let start = Utc
            .timestamp_opt(MANUAL_CLOCK_START, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::new(start)
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.now().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.now()
    }
}

/// Handler that records every task it receives and succeeds
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    received: Arc<Mutex<Vec<Task>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invocation_count(&self) -> usize {
        self.received.lock().len()
    }

    pub fn received(&self) -> Vec<Task> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl TaskHandler for RecordingHandler {
    async fn handle(&self, task: &Task) -> anyhow::Result<()> {
        self.received.lock().push(task.clone());
        Ok(())
    }
}

/// Handler that always fails with the configured message
#[derive(Debug, Clone)]
pub struct FailingHandler {
    message: String,
    invocations: Arc<AtomicUsize>,
}

impl FailingHandler {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for FailingHandler {
    async fn handle(&self, _task: &Task) -> anyhow::Result<()> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("{}", self.message))
    }
}

/// Breaker named `name` on `store`, driven by a fresh [`ManualClock`]
pub fn breaker_with_clock(
    name: &str,
    config: CircuitBreakerConfig,
    store: Arc<dyn SharedStateStore>,
) -> (CircuitBreaker, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let breaker = CircuitBreaker::builder(name, store)
        .config(config)
        .clock(clock.clone())
        .build();
    (breaker, clock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_only_when_told() {
        let clock = ManualClock::default();
        let start = clock.utc();
        assert_eq!(start.timestamp(), MANUAL_CLOCK_START);

        clock.advance(Duration::from_secs(31));
        assert_eq!((clock.utc() - start).num_seconds(), 31);
    }

    #[tokio::test]
    async fn test_failing_handler_counts_invocations() {
        let handler = FailingHandler::new("boom");
        let err = handler.handle(&Task::new("ocr")).await.unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert_eq!(handler.invocation_count(), 1);
    }
}
