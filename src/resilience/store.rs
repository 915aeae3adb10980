//! # Shared State Store
//!
//! Key-value store consulted by every [`CircuitBreaker`](super::CircuitBreaker)
//! call. The store is the durable source of truth for breaker state and is
//! expected to be shared by every process hosting a breaker of the same name.
//!
//! Only `increment` is required to be atomic. Full state tuples are read and
//! written with plain `get`/`set`, so concurrent processes racing near a
//! threshold may observe the same state (last write wins).

use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;

/// Errors surfaced by a store backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("State store backend unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt value for key '{key}': {value}")]
    CorruptValue { key: String, value: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Process-independent key-value store with atomic increment
#[async_trait]
pub trait SharedStateStore: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Atomically add one to the integer stored at `key` (missing keys count
    /// as zero) and return the new value
    async fn increment(&self, key: &str) -> StoreResult<i64>;

    async fn delete(&self, keys: &[&str]) -> StoreResult<()>;
}

/// Key layout for one breaker: `{prefix}:{name}:state|counter|opened_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerKeys {
    pub state: String,
    pub counter: String,
    pub opened_at: String,
}

impl BreakerKeys {
    pub fn new(prefix: &str, name: &str) -> Self {
        Self {
            state: format!("{prefix}:{name}:state"),
            counter: format!("{prefix}:{name}:counter"),
            opened_at: format!("{prefix}:{name}:opened_at"),
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [
            self.state.as_str(),
            self.counter.as_str(),
            self.opened_at.as_str(),
        ]
    }
}

/// In-process store backed by a concurrent map.
///
/// Suitable for a single process and for tests. Cloning shares nothing; wrap
/// in an `Arc` to share one store between breakers.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entries: DashMap<String, String>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every key
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl SharedStateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(key).map(|value| value.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn increment(&self, key: &str) -> StoreResult<i64> {
        // The entry guard holds the shard lock across read-modify-write
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| "0".to_string());
        let current: i64 = entry.parse().map_err(|_| StoreError::CorruptValue {
            key: key.to_string(),
            value: entry.value().clone(),
        })?;
        let next = current + 1;
        *entry = next.to_string();
        Ok(next)
    }

    async fn delete(&self, keys: &[&str]) -> StoreResult<()> {
        for key in keys {
            self.entries.remove(*key);
        }
        Ok(())
    }
}
