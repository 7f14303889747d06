//! # Configuration Management
//!
//! Centralized configuration for the connection core.
//!
//! This module provides structured configuration for listeners and
//! connectors, including TLS material paths, buffer sizing, the heavy-task
//! concurrency bound, and the duplicate-connection policy.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Security Considerations
//! - TLS settings enforce modern cryptography (TLS 1.2+)
//! - Payload size cap (16 MB) prevents memory exhaustion from hostile peers

use crate::error::{ProtocolError, Result};
use crate::protocol::permission::Permission;
use crate::protocol::registry::DuplicatePolicy;
use crate::utils::task_pool::DEFAULT_TASK_LIMIT;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Max allowed payload size per frame (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Default initial capacity of a connection's receive buffer
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetConfig {
    /// Listener-side configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Connector-side configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::Config(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("FRAMELINK_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(cert) = std::env::var("FRAMELINK_CERT_PATH") {
            config.server.cert_path = cert;
        }

        if let Ok(key) = std::env::var("FRAMELINK_KEY_PATH") {
            config.server.key_path = key;
        }

        if let Ok(size) = std::env::var("FRAMELINK_READ_BUFFER_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.server.read_buffer_size = val;
                config.client.read_buffer_size = val;
            }
        }

        if let Ok(limit) = std::env::var("FRAMELINK_TASK_POOL_LIMIT") {
            if let Ok(val) = limit.parse::<usize>() {
                config.server.task_pool_limit = val;
            }
        }

        Ok(config)
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
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::Config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener-side configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "127.0.0.1:9000")
    pub address: String,

    /// Path to the PEM-encoded server certificate
    pub cert_path: String,

    /// Path to the PEM-encoded PKCS8 private key
    pub key_path: String,

    /// Initial capacity of each connection's receive buffer
    pub read_buffer_size: usize,

    /// Concurrency bound for heavy-handler execution
    pub task_pool_limit: usize,

    /// Permission assigned to every newly registered connection
    pub default_permission: Permission,

    /// Policy applied when a peer identity is already registered
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:9000"),
            cert_path: String::from("server-cert.pem"),
            key_path: String::from("server-key.pem"),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            task_pool_limit: DEFAULT_TASK_LIMIT,
            default_permission: Permission::None,
            duplicate_policy: DuplicatePolicy::AcceptAll,
        }
    }
}

impl ServerConfig {
    /// Validate listener configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:9000')",
                self.address
            ));
        }

        if self.cert_path.is_empty() {
            errors.push("Certificate path cannot be empty".to_string());
        }

        if self.key_path.is_empty() {
            errors.push("Private key path cannot be empty".to_string());
        }

        if self.read_buffer_size == 0 {
            errors.push("Read buffer size must be greater than 0".to_string());
        } else if self.read_buffer_size > MAX_PAYLOAD_SIZE {
            errors.push(format!(
                "Read buffer size too large: {} (maximum: {} bytes)",
                self.read_buffer_size, MAX_PAYLOAD_SIZE
            ));
        }

        if self.task_pool_limit == 0 {
            errors.push("Task pool limit must be greater than 0".to_string());
        } else if self.task_pool_limit > 100_000 {
            errors.push(format!(
                "Task pool limit very high: {} (ensure system resources can support this)",
                self.task_pool_limit
            ));
        }

        errors
    }
}

/// Connector-side configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Target server address (e.g., "example.com:9000")
    pub address: String,

    /// Server name presented for TLS verification
    pub server_name: String,

    /// Initial capacity of the connection's receive buffer
    pub read_buffer_size: usize,

    /// Skip certificate verification (development/testing only)
    pub insecure: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:9000"),
            server_name: String::from("localhost"),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            insecure: false,
        }
    }
}

impl ClientConfig {
    /// Validate connector configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        }

        if self.server_name.is_empty() {
            errors.push("Server name cannot be empty".to_string());
        }

        if self.read_buffer_size == 0 {
            errors.push("Read buffer size must be greater than 0".to_string());
        }

        if self.insecure {
            errors.push(
                "WARNING: Certificate verification is disabled - not recommended for production"
                    .to_string(),
            );
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

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("framelink"),
            log_level: Level::INFO,
            log_to_console: true,
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
