//! # Structured Logging Module
//!
//! Environment-aware structured logging built on `tracing-subscriber`.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs a subscriber,
/// and an already installed global subscriber is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let format = get_log_format();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = match format {
            LogFormat::Json => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed(),
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
            return;
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            format = ?format,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
pub fn get_environment() -> String {
    std::env::var("TASKER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
pub fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn get_log_format() -> LogFormat {
    match std::env::var("TASKER_LOG_FORMAT").as_deref() {
        Ok("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}
