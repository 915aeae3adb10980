//! Configuration Loader
//!
//! Layers defaults, an optional TOML file and `TASKER_` environment overrides
//! using the `config` crate. Nested keys use a double underscore, for example
//! `TASKER_CIRCUIT_BREAKERS__DEFAULT_CONFIG__FAILURE_THRESHOLD=3`.

use super::error::ConfigResult;
use super::RelayConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/tasker-relay.toml";

/// Loaded and validated configuration
#[derive(Debug)]
pub struct ConfigManager {
    config: RelayConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from `TASKER_CONFIG_PATH` or the default path.
    ///
    /// A missing file is not an error; defaults and environment overrides apply.
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let path = env::var("TASKER_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::build(Some(&path), false)
    }

    /// Load configuration from a specific file, which must exist
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(Some(path.as_ref()), true)
    }

    /// Wrap an already constructed configuration after validating it
    pub fn from_config(config: RelayConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            source: None,
        }))
    }

    fn build(path: Option<&Path>, required: bool) -> ConfigResult<Arc<ConfigManager>> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!(path = %path.display(), required, "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(required));
        }
        builder = builder.add_source(
            Environment::with_prefix("TASKER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: RelayConfig = builder.build()?.try_deserialize()?;
        if let Some(environment) = Self::environment_override() {
            config.environment = environment;
        }
        config.validate()?;

        info!(
            environment = %config.environment,
            key_prefix = %config.circuit_breakers.key_prefix,
            component_configs = config.circuit_breakers.component_configs.len(),
            "⚙️ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            source: path.filter(|p| p.exists()).map(Path::to_path_buf),
        }))
    }

    /// Environment name from `TASKER_ENV` or `APP_ENV`, when set
    pub fn environment_override() -> Option<String> {
        env::var("TASKER_ENV").or_else(|_| env::var("APP_ENV")).ok()
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.config.environment
    }

    /// File the configuration was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}
