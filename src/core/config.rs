use anyhow::{Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::core::provider::EndpointClass;

pub const CONFIG_FILE_NAME: &str = "scorekeeper.toml";

/// Ceiling for any interval or timeout setting (one week).
const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path template for the day's event listing. `{date}` is `YYYYMMDD`.
    #[serde(default = "default_schedule_path")]
    pub schedule_path: String,

    #[serde(default = "default_legacy_path")]
    pub legacy_path: String,

    #[serde(default = "default_current_path")]
    pub current_path: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_discovery_interval_secs")]
    pub discovery_interval_secs: u64,

    /// How far ahead of the scheduled start a job begins ticking.
    #[serde(default)]
    pub lead_time_secs: u64,

    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Endpoint classes paced by the token bucket.
    #[serde(default = "default_limited_classes")]
    pub classes: Vec<EndpointClass>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database")]
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_enabled")]
    pub enabled: bool,

    #[serde(default = "default_archive_dir")]
    pub directory: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_base_url() -> String {
    "https://cdn.example-provider.net/liveData".to_string()
}
fn default_schedule_path() -> String {
    "/schedule/{date}.json".to_string()
}
fn default_legacy_path() -> String {
    "/legacy/{date}/{event_id}_boxscore.json".to_string()
}
fn default_current_path() -> String {
    "/boxscore/boxscore_{event_id}.json".to_string()
}
fn default_user_agent() -> String {
    format!("scorekeeper/{}", env!("CARGO_PKG_VERSION"))
}
fn default_poll_interval_secs() -> u64 {
    30
}
fn default_discovery_interval_secs() -> u64 {
    300
}
fn default_max_in_flight() -> usize {
    8
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_backoff_ms() -> u64 {
    500
}
fn default_requests_per_minute() -> u32 {
    60
}
fn default_burst() -> u32 {
    5
}
fn default_limited_classes() -> Vec<EndpointClass> {
    vec![EndpointClass::Legacy]
}
fn default_database() -> String {
    "scorekeeper.db".to_string()
}
fn default_archive_enabled() -> bool {
    true
}
fn default_archive_dir() -> String {
    "archive".to_string()
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            polling: PollingConfig::default(),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            storage: StorageConfig::default(),
            archive: ArchiveConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            schedule_path: default_schedule_path(),
            legacy_path: default_legacy_path(),
            current_path: default_current_path(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            discovery_interval_secs: default_discovery_interval_secs(),
            lead_time_secs: 0,
            max_in_flight: default_max_in_flight(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            burst: default_burst(),
            classes: default_limited_classes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: default_archive_enabled(),
            directory: default_archive_dir(),
        }
    }
}

impl PollerConfig {
    pub async fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let config_path = data_dir.as_ref().join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            info!("No {} found, using defaults.", CONFIG_FILE_NAME);
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(&config_path).await?;
        let config = Self::parse(&content)?;
        info!(
            "Loaded config: base_url={}, poll={}s, discovery={}s, max_in_flight={}",
            config.provider.base_url,
            config.polling.poll_interval_secs,
            config.polling.discovery_interval_secs,
            config.polling.max_in_flight
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: PollerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.polling.poll_interval_secs == 0 {
            bail!("polling.poll_interval_secs must be greater than zero");
        }
        if self.polling.discovery_interval_secs == 0 {
            bail!("polling.discovery_interval_secs must be greater than zero");
        }
        if self.polling.max_in_flight == 0 {
            bail!("polling.max_in_flight must be greater than zero");
        }
        if self.polling.request_timeout_secs == 0 {
            bail!("polling.request_timeout_secs must be greater than zero");
        }
        for (name, secs) in [
            ("polling.poll_interval_secs", self.polling.poll_interval_secs),
            ("polling.discovery_interval_secs", self.polling.discovery_interval_secs),
            ("polling.lead_time_secs", self.polling.lead_time_secs),
            ("polling.request_timeout_secs", self.polling.request_timeout_secs),
        ] {
            if secs > MAX_INTERVAL_SECS {
                bail!("{} must be at most {} seconds", name, MAX_INTERVAL_SECS);
            }
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.rate_limit.requests_per_minute == 0 {
            bail!("rate_limit.requests_per_minute must be greater than zero");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.poll_interval_secs)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.polling.discovery_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.polling.request_timeout_secs)
    }

    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.storage.database)
    }

    pub fn archive_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.archive.directory)
    }
}
