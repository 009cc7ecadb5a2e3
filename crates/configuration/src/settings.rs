use crate::error::ConfigError;
use core_types::WeightingScheme;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
///
/// Built once at startup and handed to each component; nothing reads settings
/// from global state after that.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub universe: UniverseConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Endpoints and credentials for the upstream market data providers.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Twelve Data API key, used for the ticker universe listing.
    #[serde(default)]
    pub twelve_data_key: Option<String>,
    #[serde(default = "default_twelve_data_url")]
    pub twelve_data_base_url: String,
    /// Yahoo Finance host serving quotes and daily charts.
    #[serde(default = "default_yahoo_url")]
    pub yahoo_base_url: String,
    /// Page fetched once per session to obtain the cookies Yahoo ties its crumb to.
    #[serde(default = "default_yahoo_cookie_url")]
    pub yahoo_cookie_url: String,
    /// Exchange whose listing forms the ticker universe.
    #[serde(default = "default_exchange")]
    pub exchange: String,
    /// Upper bound for any single HTTP call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// The single SQLite file holding all three tables.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UniverseConfig {
    /// How many symbols, in source order, make up the tracked universe.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Trailing calendar days of daily bars fetched per symbol.
    #[serde(default = "default_history_window")]
    pub history_window_days: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub weighting: WeightingScheme,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Wall-clock limit for one complete update run.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs are also written to a daily-rolling file in this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

fn default_twelve_data_url() -> String {
    "https://api.twelvedata.com".to_string()
}
fn default_yahoo_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}
fn default_yahoo_cookie_url() -> String {
    "https://fc.yahoo.com".to_string()
}
fn default_exchange() -> String {
    "NASDAQ".to_string()
}
fn default_request_timeout() -> u64 {
    15
}
fn default_database_path() -> PathBuf {
    PathBuf::from("data/stock_data.sqlite")
}
fn default_top_n() -> usize {
    100
}
fn default_history_window() -> u32 {
    30
}
fn default_run_timeout() -> u64 {
    30 * 60
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            twelve_data_key: None,
            twelve_data_base_url: default_twelve_data_url(),
            yahoo_base_url: default_yahoo_url(),
            yahoo_cookie_url: default_yahoo_cookie_url(),
            exchange: default_exchange(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { database_path: default_database_path() }
    }
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self { top_n: default_top_n(), history_window_days: default_history_window() }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { run_timeout_secs: default_run_timeout() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), directory: None }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr() }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The Twelve Data key, required only by commands that hit the network.
    pub fn require_twelve_data_key(&self) -> Result<&str, ConfigError> {
        match self.twelve_data_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ConfigError::ValidationError(
                "api.twelve_data_key is not set (use INDEX__API__TWELVE_DATA_KEY)".to_string(),
            )),
        }
    }
}

impl RunConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

impl Config {
    /// Rejects settings that would make an update run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.universe.top_n == 0 {
            return Err(ConfigError::ValidationError(
                "universe.top_n must be at least 1".to_string(),
            ));
        }
        // A return needs two distinct trading days.
        if self.universe.history_window_days < 2 {
            return Err(ConfigError::ValidationError(
                "universe.history_window_days must be at least 2".to_string(),
            ));
        }
        if self.api.request_timeout_secs == 0 || self.run.run_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.storage.database_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.database_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
