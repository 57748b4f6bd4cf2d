//! # Configuration Management
//!
//! Centralized configuration for the handshake server.
//!
//! This module provides structured configuration for the listener, the framing
//! layer and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` / `apply_env()`
//!
//! ## Security Considerations
//! - Every frame length is checked against `max_frame_size` before any payload
//!   is buffered; the 2 MiB default matches the vanilla server
//! - The idle timeout closes connections that stop sending mid-frame

use crate::error::{constants, ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default listen host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 25565;

/// Max allowed frame size (2 MiB, same as vanilla)
pub const MAX_FRAME_SIZE: usize = 2 * 1024 * 1024;

/// Default idle timeout for a session waiting on a frame
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time to wait for sessions during shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServerSettings {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Framing configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerSettings {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| {
            ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_CONFIG_OPEN))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_CONFIG_READ))
        })?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content).map_err(|e| {
            ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_CONFIG_PARSE))
        })
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `CRAFTWIRE_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CRAFTWIRE_HOST") {
            self.server.host = host;
        }

        if let Some(port) = lookup("CRAFTWIRE_PORT") {
            self.server.port = parse_var("CRAFTWIRE_PORT", &port)?;
        }

        if let Some(max) = lookup("CRAFTWIRE_MAX_CONNECTIONS") {
            self.server.max_connections = parse_var("CRAFTWIRE_MAX_CONNECTIONS", &max)?;
        }

        if let Some(timeout) = lookup("CRAFTWIRE_IDLE_TIMEOUT_MS") {
            let millis: u64 = parse_var("CRAFTWIRE_IDLE_TIMEOUT_MS", &timeout)?;
            self.server.idle_timeout = Duration::from_millis(millis);
        }

        if let Some(size) = lookup("CRAFTWIRE_MAX_FRAME_SIZE") {
            self.transport.max_frame_size = parse_var("CRAFTWIRE_MAX_FRAME_SIZE", &size)?;
        }

        Ok(())
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_CONFIG_SERIALIZE))
        })?;

        std::fs::write(path, content).map_err(|e| {
            ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_CONFIG_WRITE))
        })?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ProtocolError::ConfigError(format!("Invalid value for {key}: '{value}'")))
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host or IP to bind
    pub host: String,

    /// TCP port to bind
    pub port: u16,

    /// Maximum number of concurrent sessions
    pub max_connections: usize,

    /// Close a session if a frame does not arrive within this window
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from(DEFAULT_HOST),
            port: DEFAULT_PORT,
            max_connections: 1000,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// `host:port`, bracketing IPv6 literals
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Validate listener configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.is_empty() {
            errors.push("Server host cannot be empty".to_string());
        } else if self.host.chars().any(char::is_whitespace) {
            errors.push(format!("Invalid server host: '{}'", self.host));
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
        }

        if self.idle_timeout.as_millis() < 100 {
            errors.push("Idle timeout too short (minimum: 100ms)".to_string());
        } else if self.idle_timeout.as_secs() > 3600 {
            errors.push("Idle timeout too long (maximum: 1 hour)".to_string());
        }

        if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Compression mode for frames.
///
/// Only `Disabled` exists; frames are never compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    #[default]
    Disabled,
}

/// Framing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Maximum allowed frame length in bytes
    pub max_frame_size: usize,

    /// Frame compression
    #[serde(default)]
    pub compression: CompressionMode,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            compression: CompressionMode::Disabled,
        }
    }
}

impl TransportConfig {
    /// Validate framing configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_size == 0 {
            errors.push("Max frame size cannot be 0".to_string());
        } else if self.max_frame_size > i32::MAX as usize {
            errors.push(format!(
                "Max frame size too large: {} bytes (a VarInt length cannot exceed {})",
                self.max_frame_size,
                i32::MAX
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("craftwire"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
