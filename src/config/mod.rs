//! Configuration management for anthias-fleet
//!
//! Configuration comes from a TOML file or from environment variables.
//! Every section has defaults, so a file only needs the values it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::client::ClientConfig;
use crate::poller::PollerConfig;
use crate::snapshot::BuilderConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fleet Manager connection
    pub fleet_manager: FleetManagerConfig,

    /// Refresh cadence and fan-out
    pub poller: PollerSettings,

    /// Media library cache
    pub media: MediaConfig,

    /// Status server
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Fleet Manager connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetManagerConfig {
    /// Name used to address this fleet
    pub name: String,

    /// Base URL, e.g. https://fm.example.com
    pub url: String,

    /// API token
    pub token: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Token exchange timeout in seconds
    pub token_timeout_secs: u64,
}

/// Poller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    /// Seconds between refresh cycles
    pub scan_interval_secs: u64,

    /// Players fetched in parallel
    pub max_concurrent_players: usize,

    /// Fail the whole cycle when a per-player fetch is rejected for credentials
    pub abort_on_subfetch_auth_failure: bool,
}

/// Media library settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Cache TTL in seconds
    pub ttl_secs: u64,
}

/// Status server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for FleetManagerConfig {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            url: String::from("http://localhost:8000"),
            token: String::new(),
            request_timeout_secs: 15,
            token_timeout_secs: 10,
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            scan_interval_secs: 60,
            max_concurrent_players: 4,
            abort_on_subfetch_auth_failure: false,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("127.0.0.1:8123"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let fleet_manager = FleetManagerConfig {
            name: std::env::var("FLEET_NAME").unwrap_or(defaults.fleet_manager.name),
            url: std::env::var("FLEET_MANAGER_URL").unwrap_or(defaults.fleet_manager.url),
            token: std::env::var("FLEET_TOKEN").unwrap_or_default(),
            request_timeout_secs: env_parse("FLEET_REQUEST_TIMEOUT")
                .unwrap_or(defaults.fleet_manager.request_timeout_secs),
            token_timeout_secs: defaults.fleet_manager.token_timeout_secs,
        };

        let poller = PollerSettings {
            scan_interval_secs: env_parse("FLEET_SCAN_INTERVAL")
                .unwrap_or(defaults.poller.scan_interval_secs),
            max_concurrent_players: env_parse("FLEET_MAX_CONCURRENT_PLAYERS")
                .unwrap_or(defaults.poller.max_concurrent_players),
            abort_on_subfetch_auth_failure: env_parse("FLEET_ABORT_ON_SUBFETCH_AUTH_FAILURE")
                .unwrap_or(defaults.poller.abort_on_subfetch_auth_failure),
        };

        Ok(Self {
            fleet_manager,
            poller,
            media: MediaConfig {
                ttl_secs: env_parse("FLEET_MEDIA_TTL").unwrap_or(defaults.media.ttl_secs),
            },
            server: ServerConfig {
                bind_address: std::env::var("FLEET_BIND_ADDRESS")
                    .unwrap_or(defaults.server.bind_address),
            },
            logging: LoggingConfig {
                level: std::env::var("FLEET_LOG_LEVEL").unwrap_or(defaults.logging.level),
                format: std::env::var("FLEET_LOG_FORMAT").unwrap_or(defaults.logging.format),
            },
        })
    }

    /// Load configuration from a file
    ///
    /// An empty `token` in the file falls back to `FLEET_TOKEN`, so secrets
    /// can stay out of the file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        if config.fleet_manager.token.is_empty() {
            if let Ok(token) = std::env::var("FLEET_TOKEN") {
                config.fleet_manager.token = token;
            }
        }

        Ok(config)
    }

    /// File when given, environment otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let url = self.fleet_manager.url.trim();
        if url.is_empty() {
            anyhow::bail!("fleet_manager.url must not be empty");
        }
        url::Url::parse(url).with_context(|| format!("fleet_manager.url is not a valid URL: {url}"))?;

        if self.fleet_manager.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.fleet_manager.token_timeout_secs == 0 {
            anyhow::bail!("token_timeout_secs must be greater than 0");
        }

        if self.poller.scan_interval_secs == 0 {
            anyhow::bail!("scan_interval_secs must be greater than 0");
        }

        if self.poller.max_concurrent_players == 0 {
            anyhow::bail!("max_concurrent_players must be greater than 0");
        }

        self.bind_address()?;

        Ok(())
    }

    /// Validate and additionally require a token
    pub fn validate_with_token(&self) -> Result<()> {
        self.validate()?;
        if self.fleet_manager.token.trim().is_empty() {
            anyhow::bail!("No API token configured; run `anthias-fleet login` or set FLEET_TOKEN");
        }
        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.fleet_manager.request_timeout_secs)
    }

    #[must_use]
    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.fleet_manager.token_timeout_secs)
    }

    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.poller.scan_interval_secs)
    }

    #[must_use]
    pub fn media_ttl(&self) -> Duration {
        Duration::from_secs(self.media.ttl_secs)
    }

    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.server
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind_address))
    }

    /// Client settings derived from this config
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.fleet_manager.url, &self.fleet_manager.token)
            .with_timeout(self.request_timeout())
    }

    /// Poller settings derived from this config
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig::default()
            .with_scan_interval(self.scan_interval())
            .with_builder(
                BuilderConfig::default()
                    .with_max_concurrent_players(self.poller.max_concurrent_players)
                    .with_abort_on_subfetch_auth_failure(self.poller.abort_on_subfetch_auth_failure),
            )
    }
}
