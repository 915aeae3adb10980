//! # Circuit Breaker Manager
//!
//! Process-local cache of named circuit breakers. Breaker objects are cheap
//! and local; the state they read and write lives in the shared store, so two
//! managers (or two processes) handing out a breaker with the same name and
//! key prefix observe the same circuit.

use crate::config::CircuitBreakerSettings;
use crate::events::EventPublisher;
use crate::resilience::store::{SharedStateStore, StoreResult};
use crate::resilience::{CircuitBreaker, CircuitSnapshot, SystemCircuitBreakerMetrics};
use futures::future::try_join_all;
use mockable::{Clock, DefaultClock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Manager for circuit breakers keyed by component name
pub struct CircuitBreakerManager {
    /// Collection of circuit breakers by component name
    circuit_breakers: RwLock<HashMap<String, CircuitBreaker>>,
    settings: CircuitBreakerSettings,
    store: Arc<dyn SharedStateStore>,
    clock: Arc<dyn Clock + Send + Sync>,
    event_publisher: Option<EventPublisher>,
}

impl CircuitBreakerManager {
    /// Create new circuit breaker manager from settings and a shared store
    pub fn new(settings: CircuitBreakerSettings, store: Arc<dyn SharedStateStore>) -> Self {
        info!(
            key_prefix = %settings.key_prefix,
            component_configs = settings.component_configs.len(),
            "Initializing circuit breaker manager"
        );

        Self {
            circuit_breakers: RwLock::new(HashMap::new()),
            settings,
            store,
            clock: Arc::new(DefaultClock),
            event_publisher: None,
        }
    }

    /// Use the given clock for every breaker created from now on
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_publisher(mut self, event_publisher: EventPublisher) -> Self {
        self.event_publisher = Some(event_publisher);
        self
    }

    pub fn settings(&self) -> &CircuitBreakerSettings {
        &self.settings
    }

    /// Get or create circuit breaker for a component
    pub async fn get_circuit_breaker(&self, component_name: &str) -> CircuitBreaker {
        {
            let breakers = self.circuit_breakers.read().await;
            if let Some(breaker) = breakers.get(component_name) {
                return breaker.clone();
            }
        }

        let mut breakers = self.circuit_breakers.write().await;

        // Double-check pattern (another task might have created it)
        if let Some(breaker) = breakers.get(component_name) {
            return breaker.clone();
        }

        let mut builder = CircuitBreaker::builder(component_name, Arc::clone(&self.store))
            .config(
                self.settings
                    .config_for_component(component_name)
                    .to_resilience_config(),
            )
            .key_prefix(self.settings.key_prefix.clone())
            .clock(Arc::clone(&self.clock));
        if let Some(publisher) = &self.event_publisher {
            builder = builder.event_publisher(publisher.clone());
        }
        let breaker = builder.build();

        breakers.insert(component_name.to_string(), breaker.clone());

        info!(
            component = component_name,
            total_circuit_breakers = breakers.len(),
            "Created new circuit breaker"
        );

        breaker
    }

    /// Get all circuit breaker names
    pub async fn list_components(&self) -> Vec<String> {
        let breakers = self.circuit_breakers.read().await;
        let mut names: Vec<String> = breakers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop the cached breaker object; stored state is left untouched
    pub async fn remove_circuit_breaker(&self, component_name: &str) -> bool {
        let mut breakers = self.circuit_breakers.write().await;
        if breakers.remove(component_name).is_some() {
            info!(component = component_name, "Removed circuit breaker");
            true
        } else {
            false
        }
    }

    /// Delete the stored state of every cached breaker
    pub async fn reset_all(&self) -> StoreResult<()> {
        warn!("Resetting stored state for all circuit breakers");
        for breaker in self.breakers().await {
            breaker.reset().await?;
        }
        Ok(())
    }

    /// Force open all circuit breakers (emergency stop)
    pub async fn force_open_all(&self) -> StoreResult<()> {
        warn!("🚨 Forcing all circuit breakers open (emergency stop)");
        for breaker in self.breakers().await {
            breaker.force_open().await?;
        }
        Ok(())
    }

    /// Force close all circuit breakers (emergency recovery)
    pub async fn force_close_all(&self) -> StoreResult<()> {
        warn!("🚨 Forcing all circuit breakers closed (emergency recovery)");
        for breaker in self.breakers().await {
            breaker.force_closed().await?;
        }
        Ok(())
    }

    /// Read the stored state of every cached breaker
    pub async fn system_snapshot(&self) -> StoreResult<HashMap<String, CircuitSnapshot>> {
        let breakers = self.breakers().await;
        let snapshots = try_join_all(breakers.iter().map(|breaker| breaker.snapshot())).await?;
        Ok(breakers
            .iter()
            .map(|breaker| breaker.name().to_string())
            .zip(snapshots)
            .collect())
    }

    /// Get system-wide local metrics
    pub async fn get_system_metrics(&self) -> SystemCircuitBreakerMetrics {
        let mut system_metrics = SystemCircuitBreakerMetrics::new();
        for breaker in self.breakers().await {
            system_metrics.add_circuit_breaker(breaker.name().to_string(), breaker.metrics());
        }
        system_metrics
    }

    // Clone out of the lock so no guard is held across store round trips
    async fn breakers(&self) -> Vec<CircuitBreaker> {
        self.circuit_breakers.read().await.values().cloned().collect()
    }
}

impl fmt::Debug for CircuitBreakerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerManager")
            .field("settings", &self.settings)
            .field("store", &self.store)
            .finish()
    }
}
