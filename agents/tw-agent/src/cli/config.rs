//! Configuration module
//!
//! Optional TOML settings for the agent. The connection identity (identifier,
//! access token, server URL) comes from the command line and environment;
//! this file only tunes timing and logging.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::connection::keepalive::DEFAULT_HEARTBEAT_INTERVAL;
use crate::connection::transport::Credential;

/// Server used when no URL is given
pub const DEFAULT_API_ENDPOINT: &str = "https://api.tower.nf";

/// Upper bound for `heartbeat_interval_secs` (one day)
pub const MAX_HEARTBEAT_INTERVAL_SECS: u64 = 86_400;

/// Upper bound for `connect_timeout_secs` (one hour)
pub const MAX_CONNECT_TIMEOUT_SECS: u64 = 3_600;

/// Main configuration structure for the Tower Agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Heartbeat interval in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Handshake timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact, json)
    #[serde(default)]
    pub format: LogFormat,
}

fn default_heartbeat_interval() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL.as_secs()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject settings the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        let heartbeat = self.connection.heartbeat_interval_secs;
        if heartbeat == 0 || heartbeat > MAX_HEARTBEAT_INTERVAL_SECS {
            bail!(
                "connection.heartbeat_interval_secs must be between 1 and {}, got {}",
                MAX_HEARTBEAT_INTERVAL_SECS,
                heartbeat
            );
        }
        let timeout = self.connection.connect_timeout_secs;
        if timeout == 0 || timeout > MAX_CONNECT_TIMEOUT_SECS {
            bail!(
                "connection.connect_timeout_secs must be between 1 and {}, got {}",
                MAX_CONNECT_TIMEOUT_SECS,
                timeout
            );
        }
        Ok(())
    }
}

/// Turn the access token given on the command line or in the environment
/// into a credential, rejecting a missing or empty one.
pub fn require_access_token(token: Option<String>) -> Result<Credential> {
    let credential = Credential::new(token.unwrap_or_default());
    if credential.is_empty() {
        bail!("Missing access token: use --access-token or set TOWER_ACCESS_TOKEN");
    }
    Ok(credential)
}
