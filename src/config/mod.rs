//! # Configuration
//!
//! Settings for circuit breakers and the event sink, loaded from a TOML file
//! with `TASKER_` environment overrides (see [`loader::ConfigManager`]).
//!
//! ```toml
//! environment = "production"
//!
//! [circuit_breakers]
//! key_prefix = "circuit_breaker"
//!
//! [circuit_breakers.default_config]
//! failure_threshold = 5
//! timeout_seconds = 30
//! success_threshold = 2
//!
//! [circuit_breakers.component_configs.vision]
//! failure_threshold = 3
//! timeout_seconds = 60
//! success_threshold = 1
//!
//! [events]
//! channel_capacity = 1000
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::resilience::DEFAULT_KEY_PREFIX;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    pub environment: String,
    pub circuit_breakers: CircuitBreakerSettings,
    pub events: EventSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            circuit_breakers: CircuitBreakerSettings::default(),
            events: EventSettings::default(),
        }
    }
}

impl RelayConfig {
    /// Validate every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.circuit_breakers.validate()?;
        self.events.validate()
    }
}

/// Circuit breaker settings shared by every breaker created through the manager
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Namespace for breaker keys in the shared store
    pub key_prefix: String,

    /// Configuration for breakers without a specific entry
    pub default_config: CircuitBreakerComponentConfig,

    /// Specific configurations for named breakers
    pub component_configs: HashMap<String, CircuitBreakerComponentConfig>,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_config: CircuitBreakerComponentConfig::default(),
            component_configs: HashMap::new(),
        }
    }
}

impl CircuitBreakerSettings {
    /// Get configuration for a specific component
    pub fn config_for_component(&self, component_name: &str) -> CircuitBreakerComponentConfig {
        self.component_configs
            .get(component_name)
            .cloned()
            .unwrap_or_else(|| self.default_config.clone())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.key_prefix.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "circuit_breakers.key_prefix",
                &self.key_prefix,
                "must not be empty",
            ));
        }

        self.default_config
            .validate("circuit_breakers.default_config")?;
        for (name, component) in &self.component_configs {
            component.validate(&format!("circuit_breakers.component_configs.{name}"))?;
        }
        Ok(())
    }
}

/// Circuit breaker configuration for a specific component
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerComponentConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,

    /// Time to wait in open state before attempting recovery (in seconds)
    pub timeout_seconds: u64,

    /// Number of successful calls in half-open state to close circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerComponentConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_seconds: 30,
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerComponentConfig {
    /// Convert to resilience module's format
    pub fn to_resilience_config(&self) -> crate::resilience::CircuitBreakerConfig {
        crate::resilience::CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            timeout: Duration::from_secs(self.timeout_seconds),
            success_threshold: self.success_threshold,
        }
    }

    fn validate(&self, path: &str) -> ConfigResult<()> {
        self.to_resilience_config()
            .validate()
            .map_err(|reason| ConfigurationError::invalid_value(path, format!("{self:?}"), reason))
    }
}

/// Event sink settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventSettings {
    /// Capacity of the broadcast channel behind the event publisher
    pub channel_capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
        }
    }
}

impl EventSettings {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                self.channel_capacity,
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.circuit_breakers.key_prefix, "circuit_breaker");
    }

    #[test]
    fn test_component_config_falls_back_to_default() {
        let mut settings = CircuitBreakerSettings::default();
        settings.component_configs.insert(
            "vision".to_string(),
            CircuitBreakerComponentConfig {
                failure_threshold: 3,
                timeout_seconds: 60,
                success_threshold: 1,
            },
        );

        assert_eq!(settings.config_for_component("vision").failure_threshold, 3);
        assert_eq!(
            settings.config_for_component("extraction"),
            CircuitBreakerComponentConfig::default()
        );

        let resilience = settings.config_for_component("vision").to_resilience_config();
        assert_eq!(resilience.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_validation_rejects_zero_thresholds() {
        let mut config = RelayConfig::default();
        config.circuit_breakers.component_configs.insert(
            "vision".to_string(),
            CircuitBreakerComponentConfig {
                failure_threshold: 0,
                ..Default::default()
            },
        );

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("component_configs.vision"));
    }

    #[test]
    fn test_validation_rejects_empty_prefix_and_capacity() {
        let mut config = RelayConfig::default();
        config.circuit_breakers.key_prefix = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.events.channel_capacity = 0;
        assert!(config.validate().is_err());
    }
}
