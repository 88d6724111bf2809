//! # Configuration Management
//!
//! Centralized configuration for the chat engine.
//!
//! [`EngineConfig`] groups the chat server connection settings, the master
//! server login settings and the logging setup. Every section has working
//! defaults, so a config file only needs the values that differ.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults or `default_with_overrides()`
//! - `HONCHAT_*` environment variables via `from_env()`

use crate::error::{ConfigError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default chat server port
pub const DEFAULT_CHAT_PORT: u16 = 11031;

/// Chat protocol version sent in AUTH_INFO
pub const DEFAULT_PROTOCOL_VERSION: u32 = 21;

/// Default master server base URL
pub const DEFAULT_MASTER_URL: &str = "http://masterserver.hon.s2games.com/";

/// Default basic (MOTD) server base URL
pub const DEFAULT_BASIC_URL: &str = "http://heroesofnewerth.com/";

/// Client version reported to the master server. Must have four components.
pub const DEFAULT_CLIENT_VERSION: &str = "2.1.10.0";

/// Top level configuration for one chat engine
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct EngineConfig {
    /// Chat server connection configuration
    #[serde(default)]
    pub chat: ChatConfig,

    /// Master server login configuration
    #[serde(default)]
    pub master: MasterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ConfigError::Invalid(format!("Failed to parse TOML: {e}")).into())
    }

    /// Load configuration from environment variables on top of the defaults.
    ///
    /// Unparseable values are rejected rather than silently ignored.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = env_parse::<u16>("HONCHAT_CHAT_PORT")? {
            config.chat.port = port;
        }
        if let Some(protocol) = env_parse::<u32>("HONCHAT_PROTOCOL")? {
            config.chat.protocol = protocol;
        }
        if let Some(invisible) = env_parse::<bool>("HONCHAT_INVISIBLE")? {
            config.chat.invisible = invisible;
        }
        if let Some(ms) = env_parse::<u64>("HONCHAT_CONNECT_TIMEOUT_MS")? {
            config.chat.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("HONCHAT_READ_TIMEOUT_MS")? {
            config.chat.read_timeout = Duration::from_millis(ms);
        }
        if let Ok(url) = std::env::var("HONCHAT_MASTER_URL") {
            config.master.master_url = url;
        }
        if let Ok(url) = std::env::var("HONCHAT_BASIC_URL") {
            config.master.basic_url = url;
        }
        if let Ok(version) = std::env::var("HONCHAT_CLIENT_VERSION") {
            config.master.client_version = version;
        }
        if let Some(level) = env_parse::<Level>("HONCHAT_LOG_LEVEL")? {
            config.logging.log_level = level;
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
            .map_err(|e| ConfigError::Invalid(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::Invalid(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.chat.validate());
        errors.extend(self.master.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            ))
            .into())
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("Invalid value for {key}: '{raw}'")).into()),
        Err(_) => Ok(None),
    }
}

/// How decoded packets are handed to event handlers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DispatchMode {
    /// One dispatch worker per connection, handlers see packets in arrival order
    #[default]
    Ordered,
    /// Each packet dispatched on its own worker, at most `max_in_flight` at once
    Parallel { max_in_flight: usize },
}

/// Chat server connection configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    /// Chat server port; the host comes from the session's chat URL
    pub port: u16,

    /// Protocol version sent in AUTH_INFO
    pub protocol: u32,

    /// Log in invisible
    pub invisible: bool,

    /// Timeout for the TCP connect
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Bound on a single socket read; expiry is not an error
    #[serde(with = "duration_serde")]
    pub read_timeout: Duration,

    /// Socket read buffer capacity in bytes
    pub read_buffer_size: usize,

    /// Interval between authentication checks after AUTH_INFO
    #[serde(with = "duration_serde")]
    pub auth_poll_interval: Duration,

    /// Number of authentication checks before giving up
    pub auth_poll_attempts: u32,

    /// Capacity of the queue feeding the ordered dispatch worker
    pub dispatch_queue: usize,

    /// How long disconnect waits for background tasks
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// How packets are handed to handlers
    pub dispatch: DispatchMode,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_CHAT_PORT,
            protocol: DEFAULT_PROTOCOL_VERSION,
            invisible: false,
            connect_timeout: timeout::CONNECT_TIMEOUT,
            read_timeout: timeout::READ_TIMEOUT,
            read_buffer_size: 4096,
            auth_poll_interval: timeout::AUTH_POLL_INTERVAL,
            auth_poll_attempts: 10,
            dispatch_queue: 256,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
            dispatch: DispatchMode::Ordered,
        }
    }
}

impl ChatConfig {
    /// Validate chat configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Chat port cannot be 0".to_string());
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connect timeout too long (maximum: 300s)".to_string());
        }

        if self.read_timeout.as_millis() < 10 {
            errors.push("Read timeout too short (minimum: 10ms)".to_string());
        }

        if self.read_buffer_size < 512 {
            errors.push(format!(
                "Read buffer too small: {} bytes (minimum: 512)",
                self.read_buffer_size
            ));
        }

        if self.auth_poll_interval.is_zero() {
            errors.push("Auth poll interval must be greater than 0".to_string());
        }

        if self.auth_poll_attempts == 0 {
            errors.push("Auth poll attempts must be greater than 0".to_string());
        }

        if self.dispatch_queue == 0 {
            errors.push("Dispatch queue capacity must be greater than 0".to_string());
        }

        if let DispatchMode::Parallel { max_in_flight } = self.dispatch {
            if max_in_flight == 0 {
                errors.push("Parallel dispatch needs max_in_flight greater than 0".to_string());
            }
        }

        if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Master server login configuration.
///
/// The retry fields drive [`RetryPolicy`](crate::service::RetryPolicy). The
/// URLs and client version are not read by the engine itself; they are the
/// settings a [`MasterServer`](crate::service::MasterServer) implementation
/// needs to reach the master and basic servers.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MasterConfig {
    /// Base URL of the master server
    pub master_url: String,

    /// Base URL of the basic (MOTD) server
    pub basic_url: String,

    /// Client version reported in the user agent
    pub client_version: String,

    /// Login attempts before the last error surfaces
    pub max_attempts: u32,

    /// Delay after the first failed attempt, doubled after each further one
    #[serde(with = "duration_serde")]
    pub backoff_base: Duration,

    /// Bound on a single login or logout attempt
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            master_url: DEFAULT_MASTER_URL.to_string(),
            basic_url: DEFAULT_BASIC_URL.to_string(),
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
            request_timeout: Duration::from_secs(20),
        }
    }
}

impl MasterConfig {
    /// Validate master server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (name, url) in [("Master", &self.master_url), ("Basic", &self.basic_url)] {
            if url.is_empty() {
                errors.push(format!("{name} server URL cannot be empty"));
            } else if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(format!("{name} server URL must be http(s): '{url}'"));
            }
        }

        if self.client_version.split('.').count() != 4 {
            errors.push(format!(
                "Client version must have four components: '{}'",
                self.client_version
            ));
        }

        if self.max_attempts == 0 {
            errors.push("Login attempts must be greater than 0".to_string());
        }

        if self.request_timeout.as_millis() < 100 {
            errors.push("Request timeout too short (minimum: 100ms)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level, overridden by `RUST_LOG` when set
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,

    /// Whether to print the event target (module path)
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            json_format: false,
            show_target: true,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.json_format && !self.show_target {
            errors.push("JSON logs always carry the target; set show_target = true".to_string());
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
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
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
        level.as_str().to_lowercase().serialize(serializer)
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
