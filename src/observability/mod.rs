//! Structured logging setup.

use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable controlling the log filter.
pub const LOG_ENV_VAR: &str = "EDUCHAT_LOG";

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Base filter directive when `EDUCHAT_LOG` is unset.
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            default_filter: "educhat=info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Config with a verbose default filter (debug level for this crate).
    #[must_use]
    pub fn verbose() -> Self {
        Self {
            default_filter: "educhat=debug".to_string(),
            ..Self::default()
        }
    }
}

/// Initializes the global subscriber. Safe to call more than once; only the
/// first call takes effect.
///
/// # Errors
///
/// Returns an error if a global subscriber was already installed outside
/// this function.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init(),
    };

    result.map_err(|e| Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: e.to_string(),
    })?;

    let _ = LOGGING_INIT.set(());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        let config = LoggingConfig::default();
        assert_eq!(config.default_filter, "educhat=info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_verbose_filter() {
        assert_eq!(LoggingConfig::verbose().default_filter, "educhat=debug");
    }
}
