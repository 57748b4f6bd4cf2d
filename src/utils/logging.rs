//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` fmt subscriber driven by
//! [`LoggingConfig`]. `RUST_LOG`, when set, takes precedence over the
//! configured level.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

/// Build the filter for `config`, preferring `RUST_LOG` when present.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log_level.to_string().to_lowercase())
    })
}

/// Install the global subscriber.
///
/// # Errors
/// Returns `ProtocolError::ConfigError` if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(false);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| ProtocolError::ConfigError(format!("Failed to install logger: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_filter_uses_configured_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            log_level: Level::DEBUG,
            ..LoggingConfig::default()
        };
        assert_eq!(env_filter(&config).to_string(), "debug");
    }
}
