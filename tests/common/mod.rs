//! Shared fixtures and proptest strategies for the integration suites

#![allow(dead_code)]

pub mod strategies;

use std::sync::Arc;
use tasker_relay::config::{ConfigManager, RelayConfig};
use tasker_relay::resilience::{InMemoryStateStore, SharedStateStore};
use tasker_relay::system_context::SystemContextBuilder;
use tasker_relay::test_helpers::ManualClock;
use tasker_relay::SystemContext;

/// Context builder over a fresh in-memory store and a manual clock
pub fn context_builder() -> (SystemContextBuilder, Arc<InMemoryStateStore>, Arc<ManualClock>) {
    let store = Arc::new(InMemoryStateStore::new());
    let clock = Arc::new(ManualClock::default());
    let config_manager =
        ConfigManager::from_config(RelayConfig::default()).expect("default config is valid");
    let builder = SystemContext::builder(config_manager, store.clone() as Arc<dyn SharedStateStore>)
        .clock(clock.clone());
    (builder, store, clock)
}
