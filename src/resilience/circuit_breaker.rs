//! # Circuit Breaker Implementation
//!
//! Fault isolation for calls to unreliable dependencies. The classic three
//! states (Closed, Open, Half-Open) are kept in a [`SharedStateStore`] so that
//! every process hosting a breaker of the same name sees the same circuit.
//!
//! Each call refreshes `{state, counter, opened_at}` from the store, then:
//!
//! - **Open** and the reset timeout has not elapsed: reject without invoking
//!   the operation and without touching the stored counters.
//! - **Open** and the timeout has elapsed: move to Half-Open and invoke.
//! - **Closed** / **Half-Open**: invoke and record the outcome.
//!
//! The `counter` slot holds consecutive failures while Closed and successes
//! while Half-Open. It is reset to zero on every transition.

use crate::events::{names, EventPublisher};
use crate::resilience::metrics::AtomicCircuitBreakerMetrics;
use crate::resilience::store::{BreakerKeys, SharedStateStore, StoreError, StoreResult};
use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics};
use chrono::{DateTime, SecondsFormat, Utc};
use mockable::{Clock, DefaultClock};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Default namespace for breaker keys in the shared store
pub const DEFAULT_KEY_PREFIX: &str = "circuit_breaker";

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed = 0,
    /// Failure mode - all calls fail fast without executing
    Open = 1,
    /// Testing recovery - calls are allowed through and observed
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open, // Default to safest state
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CircuitState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "closed" => Ok(Self::Closed),
            "open" => Ok(Self::Open),
            "half_open" => Ok(Self::HalfOpen),
            _ => Err(format!("Invalid circuit state: {s}")),
        }
    }
}

/// Breaker state as read from the shared store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    /// Failures while Closed, successes while Half-Open
    pub counter: i64,
    /// Set iff `state` is Open
    pub opened_at: Option<DateTime<Utc>>,
}

impl Default for CircuitSnapshot {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            counter: 0,
            opened_at: None,
        }
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open; the operation was not invoked and no counter changed
    #[error("Circuit breaker '{name}' is {state}, call rejected")]
    CircuitOpen { name: String, state: CircuitState },

    /// The operation's own error, recorded as a failure and returned as-is
    #[error("{0}")]
    OperationFailed(E),

    /// The shared store could not be read before the call
    #[error("Circuit breaker state store error: {0}")]
    Store(#[from] StoreError),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Recover the wrapped operation's error, if this is one
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::OperationFailed(err) => Some(err),
            _ => None,
        }
    }
}

struct BreakerInner {
    name: String,
    config: CircuitBreakerConfig,
    keys: BreakerKeys,
    store: Arc<dyn SharedStateStore>,
    clock: Arc<dyn Clock + Send + Sync>,
    metrics: AtomicCircuitBreakerMetrics,
    event_publisher: Option<EventPublisher>,
}

/// Circuit breaker whose state lives in a shared store.
///
/// Cloning is cheap and clones share the same local metrics.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<BreakerInner>,
}

/// Builder for [`CircuitBreaker`]
pub struct CircuitBreakerBuilder {
    name: String,
    store: Arc<dyn SharedStateStore>,
    config: CircuitBreakerConfig,
    key_prefix: String,
    clock: Arc<dyn Clock + Send + Sync>,
    event_publisher: Option<EventPublisher>,
}

impl CircuitBreakerBuilder {
    pub fn config(mut self, config: CircuitBreakerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn event_publisher(mut self, event_publisher: EventPublisher) -> Self {
        self.event_publisher = Some(event_publisher);
        self
    }

    pub fn build(self) -> CircuitBreaker {
        info!(
            component = %self.name,
            failure_threshold = self.config.failure_threshold,
            timeout_seconds = self.config.timeout.as_secs(),
            success_threshold = self.config.success_threshold,
            key_prefix = %self.key_prefix,
            "🛡️ Circuit breaker initialized"
        );

        CircuitBreaker {
            inner: Arc::new(BreakerInner {
                keys: BreakerKeys::new(&self.key_prefix, &self.name),
                name: self.name,
                config: self.config,
                store: self.store,
                clock: self.clock,
                metrics: AtomicCircuitBreakerMetrics::default(),
                event_publisher: self.event_publisher,
            }),
        }
    }
}

impl CircuitBreaker {
    /// Create a circuit breaker with the default key prefix and system clock
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        store: Arc<dyn SharedStateStore>,
    ) -> Self {
        Self::builder(name, store).config(config).build()
    }

    pub fn builder(name: impl Into<String>, store: Arc<dyn SharedStateStore>) -> CircuitBreakerBuilder {
        CircuitBreakerBuilder {
            name: name.into(),
            store,
            config: CircuitBreakerConfig::default(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            clock: Arc::new(DefaultClock),
            event_publisher: None,
        }
    }

    /// Get component name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.inner.config
    }

    pub fn keys(&self) -> &BreakerKeys {
        &self.inner.keys
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// Every error returned by `operation` counts as one failure, including
    /// errors produced by the caller's own timeout logic. If the returned
    /// future is dropped while `operation` is in flight, the cancellation is
    /// recorded as a failure on a background task.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let snapshot = self.snapshot().await?;

        let state = match snapshot.state {
            CircuitState::Open if !self.reset_timeout_elapsed(&snapshot) => {
                self.reject(&snapshot);
                return Err(CircuitBreakerError::CircuitOpen {
                    name: self.inner.name.clone(),
                    state: CircuitState::Open,
                });
            }
            CircuitState::Open => {
                self.transition_to_half_open(CircuitState::Open).await?;
                CircuitState::HalfOpen
            }
            state => state,
        };
        self.inner.metrics.observe_state(state);

        let guard = InFlightGuard::new(self.clone(), state);
        let start_time = Instant::now();
        let result = operation().await;
        let duration = start_time.elapsed();
        guard.disarm();

        match &result {
            Ok(_) => {
                self.inner.metrics.record_success(duration);
                debug!(
                    component = %self.inner.name,
                    duration_ms = duration.as_millis() as u64,
                    "🟢 Operation succeeded"
                );
                if let Err(err) = self.record_success(state).await {
                    warn!(component = %self.inner.name, error = %err, "Failed to record success in state store");
                }
            }
            Err(_) => {
                self.inner.metrics.record_failure(duration);
                debug!(
                    component = %self.inner.name,
                    duration_ms = duration.as_millis() as u64,
                    "🔴 Operation failed"
                );
                if let Err(err) = self.record_failure(state).await {
                    warn!(component = %self.inner.name, error = %err, "Failed to record failure in state store");
                }
            }
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Read `{state, counter, opened_at}` from the shared store
    pub async fn snapshot(&self) -> StoreResult<CircuitSnapshot> {
        let store = &self.inner.store;
        let keys = &self.inner.keys;

        let state: CircuitState = match store.get(&keys.state).await? {
            Some(raw) => raw.parse().map_err(|_| StoreError::CorruptValue {
                key: keys.state.clone(),
                value: raw.clone(),
            })?,
            None => CircuitState::Closed,
        };

        let counter: i64 = match store.get(&keys.counter).await? {
            Some(raw) => raw.parse().map_err(|_| StoreError::CorruptValue {
                key: keys.counter.clone(),
                value: raw.clone(),
            })?,
            None => 0,
        };

        let opened_at = match store.get(&keys.opened_at).await? {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|_| StoreError::CorruptValue {
                        key: keys.opened_at.clone(),
                        value: raw.clone(),
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        Ok(CircuitSnapshot {
            state,
            counter,
            opened_at,
        })
    }

    /// Get current circuit state from the shared store
    pub async fn current_state(&self) -> StoreResult<CircuitState> {
        Ok(self.snapshot().await?.state)
    }

    /// Get current local metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.inner.metrics.snapshot()
    }

    /// Force circuit to open state (for emergency situations)
    pub async fn force_open(&self) -> StoreResult<()> {
        warn!(component = %self.inner.name, "🚨 Circuit breaker forced open");
        let from = self.current_state().await?;
        self.transition_to_open(from).await
    }

    /// Force circuit to closed state (for emergency recovery)
    pub async fn force_closed(&self) -> StoreResult<()> {
        warn!(component = %self.inner.name, "🚨 Circuit breaker forced closed");
        let from = self.current_state().await?;
        self.transition_to_closed(from).await
    }

    /// Delete the stored state; the next call starts Closed with a zero counter
    pub async fn reset(&self) -> StoreResult<()> {
        info!(component = %self.inner.name, "Circuit breaker state reset");
        self.inner.store.delete(&self.inner.keys.all()).await
    }

    fn reset_timeout_elapsed(&self, snapshot: &CircuitSnapshot) -> bool {
        let Some(opened_at) = snapshot.opened_at else {
            warn!(component = %self.inner.name, "Circuit open but no timestamp recorded");
            return true;
        };

        // A negative elapsed time (opened_at ahead of this clock) means not yet
        match (self.inner.clock.utc() - opened_at).to_std() {
            Ok(elapsed) => elapsed >= self.inner.config.timeout,
            Err(_) => false,
        }
    }

    fn reject(&self, snapshot: &CircuitSnapshot) {
        self.inner.metrics.record_rejection();
        self.inner.metrics.observe_state(CircuitState::Open);
        debug!(component = %self.inner.name, "⛔ Call rejected, circuit open");
        self.publish(
            names::CIRCUIT_REJECTED,
            json!({
                "name": self.inner.name,
                "state": CircuitState::Open,
                "opened_at": snapshot.opened_at,
            }),
        );
    }

    async fn record_success(&self, state: CircuitState) -> StoreResult<()> {
        match state {
            CircuitState::HalfOpen => {
                let successes = self.inner.store.increment(&self.inner.keys.counter).await?;
                if successes >= i64::from(self.inner.config.success_threshold) {
                    self.transition_to_closed(CircuitState::HalfOpen).await?;
                }
            }
            CircuitState::Closed => {
                self.inner.store.set(&self.inner.keys.counter, "0").await?;
            }
            CircuitState::Open => {
                warn!(component = %self.inner.name, "Success recorded while circuit is open");
            }
        }
        Ok(())
    }

    async fn record_failure(&self, state: CircuitState) -> StoreResult<()> {
        match state {
            CircuitState::Closed => {
                let failures = self.inner.store.increment(&self.inner.keys.counter).await?;
                if failures >= i64::from(self.inner.config.failure_threshold) {
                    self.transition_to_open(CircuitState::Closed).await?;
                }
            }
            CircuitState::HalfOpen => {
                // Any failure in half-open state immediately opens circuit
                self.transition_to_open(CircuitState::HalfOpen).await?;
            }
            CircuitState::Open => {}
        }
        Ok(())
    }

    /// Transition to closed state (normal operation)
    async fn transition_to_closed(&self, from: CircuitState) -> StoreResult<()> {
        let store = &self.inner.store;
        let keys = &self.inner.keys;
        store.set(&keys.state, CircuitState::Closed.as_str()).await?;
        store.set(&keys.counter, "0").await?;
        store.delete(&[keys.opened_at.as_str()]).await?;

        self.inner.metrics.observe_state(CircuitState::Closed);

        info!(component = %self.inner.name, from = %from, "🟢 Circuit breaker closed (recovered)");
        self.publish_transition(names::CIRCUIT_CLOSED, from, CircuitState::Closed, None);
        Ok(())
    }

    /// Transition to open state (failing fast)
    async fn transition_to_open(&self, from: CircuitState) -> StoreResult<()> {
        let store = &self.inner.store;
        let keys = &self.inner.keys;
        let opened_at = self.inner.clock.utc();

        // opened_at lands before state so readers never see Open without it
        store
            .set(&keys.opened_at, &opened_at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .await?;
        store.set(&keys.counter, "0").await?;
        store.set(&keys.state, CircuitState::Open.as_str()).await?;

        self.inner.metrics.observe_state(CircuitState::Open);

        error!(
            component = %self.inner.name,
            from = %from,
            failure_threshold = self.inner.config.failure_threshold,
            timeout_seconds = self.inner.config.timeout.as_secs(),
            "🔴 Circuit breaker opened (failing fast)"
        );
        self.publish_transition(names::CIRCUIT_OPENED, from, CircuitState::Open, Some(opened_at));
        Ok(())
    }

    /// Transition to half-open state (testing recovery)
    async fn transition_to_half_open(&self, from: CircuitState) -> StoreResult<()> {
        let store = &self.inner.store;
        let keys = &self.inner.keys;
        store.set(&keys.state, CircuitState::HalfOpen.as_str()).await?;
        store.set(&keys.counter, "0").await?;
        store.delete(&[keys.opened_at.as_str()]).await?;

        self.inner.metrics.observe_state(CircuitState::HalfOpen);

        info!(
            component = %self.inner.name,
            success_threshold = self.inner.config.success_threshold,
            "🟡 Circuit breaker half-open (testing recovery)"
        );
        self.publish_transition(names::CIRCUIT_HALF_OPEN, from, CircuitState::HalfOpen, None);
        Ok(())
    }

    fn publish_transition(
        &self,
        event_name: &str,
        from: CircuitState,
        to: CircuitState,
        opened_at: Option<DateTime<Utc>>,
    ) {
        self.publish(
            event_name,
            json!({
                "name": self.inner.name,
                "from": from,
                "to": to,
                "opened_at": opened_at,
            }),
        );
    }

    fn publish(&self, event_name: &str, context: serde_json::Value) {
        if let Some(publisher) = &self.inner.event_publisher {
            publisher.publish(event_name, context);
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .field("keys", &self.inner.keys)
            .field("store", &self.inner.store)
            .finish()
    }
}

/// Records a failure if the in-flight operation is dropped before completing
struct InFlightGuard {
    breaker: Option<CircuitBreaker>,
    state: CircuitState,
}

impl InFlightGuard {
    fn new(breaker: CircuitBreaker, state: CircuitState) -> Self {
        Self {
            breaker: Some(breaker),
            state,
        }
    }

    fn disarm(mut self) {
        self.breaker = None;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let Some(breaker) = self.breaker.take() else {
            return;
        };
        let state = self.state;
        breaker
            .inner
            .metrics
            .record_failure(std::time::Duration::ZERO);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(component = %breaker.inner.name, "Operation cancelled in flight, recording failure");
                handle.spawn(async move {
                    if let Err(err) = breaker.record_failure(state).await {
                        warn!(component = %breaker.inner.name, error = %err, "Failed to record cancellation");
                    }
                });
            }
            Err(_) => {
                warn!(
                    component = %breaker.inner.name,
                    "Operation cancelled outside a runtime, failure not recorded in state store"
                );
            }
        }
    }
}
