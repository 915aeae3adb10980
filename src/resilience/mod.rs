//! # Resilience Module
//!
//! Circuit breakers whose state is kept in a store shared across processes.
//!
//! ## Architecture
//!
//! - **Circuit Breakers**: Reject calls to an unhealthy dependency and probe recovery
//! - **Shared State Store**: Durable `{state, counter, opened_at}` per breaker name
//! - **Manager**: Process-local cache of breaker objects keyed by name
//! - **Metrics**: Process-local call accounting
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasker_relay::resilience::{CircuitBreaker, CircuitBreakerConfig, InMemoryStateStore};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CircuitBreakerConfig {
//!     failure_threshold: 5,
//!     timeout: Duration::from_secs(30),
//!     success_threshold: 2,
//! };
//!
//! let circuit_breaker = CircuitBreaker::new(
//!     "vision_service",
//!     config,
//!     Arc::new(InMemoryStateStore::new()),
//! );
//!
//! let extracted = circuit_breaker
//!     .call(|| async { Ok::<_, std::io::Error>("extracted") })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod manager;
pub mod metrics;
pub mod store;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerBuilder, CircuitBreakerError, CircuitSnapshot, CircuitState,
    DEFAULT_KEY_PREFIX,
};
pub use config::CircuitBreakerConfig;
pub use manager::CircuitBreakerManager;
pub use metrics::{CircuitBreakerMetrics, SystemCircuitBreakerMetrics};
pub use store::{BreakerKeys, InMemoryStateStore, SharedStateStore, StoreError, StoreResult};
