//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub hub: HubConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Listening server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// How long in-flight requests get to finish after a shutdown signal
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Directory `--migrate` reads from, instead of the one the binary was built with
    #[serde(default)]
    pub migrations_dir: Option<String>,
}

/// JWT configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,
}

/// Broadcast hub and session tuning
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Capacity of each session's outbound queue
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    /// Capacity of the coordinator's command channel
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
    /// Deadline for a single websocket write
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
    /// Inactivity deadline on the read side
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
    /// Keepalive ping period, must be shorter than the pong timeout
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
    /// Largest inbound message accepted, in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Whether a sender's other sessions receive their own messages
    #[serde(default = "default_echo_to_sender")]
    pub echo_to_sender: bool,
}

impl HubConfig {
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    #[must_use]
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: default_outbound_buffer(),
            command_buffer: default_command_buffer(),
            write_timeout_secs: default_write_timeout(),
            pong_timeout_secs: default_pong_timeout(),
            ping_interval_secs: default_ping_interval(),
            max_message_size: default_max_message_size(),
            echo_to_sender: default_echo_to_sender(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "relay".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_shutdown_grace() -> u64 {
    5
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_access_token_expiry() -> i64 {
    86400 // 24 hours
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_command_buffer() -> usize {
    1024
}

fn default_write_timeout() -> u64 {
    10
}

fn default_pong_timeout() -> u64 {
    60
}

fn default_ping_interval() -> u64 {
    // 9/10 of the pong timeout
    54
}

fn default_max_message_size() -> usize {
    5120
}

fn default_echo_to_sender() -> bool {
    true
}

/// Parse an optional variable, falling back to `default` when unset
fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: impl FnOnce() -> T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(default()),
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, ConfigError> {
    lookup(key).ok_or(ConfigError::MissingVar(key))
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let pong_timeout_secs = parse_or(&lookup, "HUB_PONG_TIMEOUT_SECS", default_pong_timeout)?;
        let ping_interval_secs = parse_or(&lookup, "HUB_PING_INTERVAL_SECS", || {
            pong_timeout_secs * 9 / 10
        })?;

        if ping_interval_secs == 0 || ping_interval_secs >= pong_timeout_secs {
            return Err(ConfigError::InvalidValue(
                "HUB_PING_INTERVAL_SECS",
                format!("{ping_interval_secs} (must be between 1 and the pong timeout)"),
            ));
        }

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            gateway: ServerConfig {
                host: lookup("GATEWAY_HOST").unwrap_or_else(default_host),
                port: required(&lookup, "GATEWAY_PORT")?
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("GATEWAY_PORT", "not a port".into()))?,
                shutdown_grace_secs: parse_or(&lookup, "SHUTDOWN_GRACE_SECS", default_shutdown_grace)?,
            },
            database: DatabaseConfig {
                url: required(&lookup, "DATABASE_URL")?,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", default_max_connections)?,
                min_connections: parse_or(&lookup, "DATABASE_MIN_CONNECTIONS", default_min_connections)?,
                migrations_dir: lookup("MIGRATIONS_DIR").filter(|dir| !dir.trim().is_empty()),
            },
            jwt: JwtConfig {
                secret: required(&lookup, "JWT_SECRET")?,
                access_token_expiry: parse_or(
                    &lookup,
                    "JWT_ACCESS_TOKEN_EXPIRY",
                    default_access_token_expiry,
                )?,
            },
            hub: HubConfig {
                outbound_buffer: parse_or(&lookup, "HUB_OUTBOUND_BUFFER", default_outbound_buffer)?,
                command_buffer: parse_or(&lookup, "HUB_COMMAND_BUFFER", default_command_buffer)?,
                write_timeout_secs: parse_or(&lookup, "HUB_WRITE_TIMEOUT_SECS", default_write_timeout)?,
                pong_timeout_secs,
                ping_interval_secs,
                max_message_size: parse_or(&lookup, "HUB_MAX_MESSAGE_SIZE", default_max_message_size)?,
                echo_to_sender: parse_or(&lookup, "HUB_ECHO_TO_SENDER", default_echo_to_sender)?,
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
