//! Configuration for the market crawler.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Records emitted per scraped table row
pub const REPLICATION_FACTOR: usize = 10;

/// Currency label written on every record
pub const CURRENCY_LABEL: &str = "Pessoas";

/// Region used when the row has no region cell
pub const FALLBACK_REGION: &str = "Unknown";

/// Artifact file name prefix and extension
pub const ARTIFACT_PREFIX: &str = "market_data_";
pub const ARTIFACT_EXTENSION: &str = ".csv";
pub const ARTIFACT_CONTENT_TYPE: &str = "text/csv";

/// Source page configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_url")]
    pub url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,
    #[serde(default = "default_table_timeout_secs")]
    pub table_timeout_secs: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Chrome binary override; auto-detected when unset
    #[serde(default)]
    pub chrome_executable: Option<String>,
}

fn default_source_url() -> String {
    crate::scraper::SOURCE_URL.to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/122.0 Safari/537.36"
        .to_string()
}

fn default_viewport_width() -> u32 {
    1920
}

fn default_viewport_height() -> u32 {
    1080
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_table_timeout_secs() -> u64 {
    20
}

fn default_settle_delay_ms() -> u64 {
    2000
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            user_agent: default_user_agent(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            table_timeout_secs: default_table_timeout_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            chrome_executable: None,
        }
    }
}

impl SourceConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn table_timeout(&self) -> Duration {
        Duration::from_secs(self.table_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Remote object store (Supabase Storage) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Project REST URL, e.g. https://xxxx.supabase.co
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_max_artifacts")]
    pub max_artifacts: usize,
}

fn default_bucket() -> String {
    "market-data".to_string()
}

fn default_max_artifacts() -> usize {
    3
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key: String::new(),
            bucket: default_bucket(),
            max_artifacts: default_max_artifacts(),
        }
    }
}

impl StorageConfig {
    /// Check that the URL is a REST endpoint and a key is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.url.trim().to_lowercase();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidStorageUrl(self.url.clone()));
        }
        if self.key.trim().is_empty() {
            return Err(ConfigError::MissingStorageKey);
        }
        Ok(())
    }
}

/// What to do when a firing arrives while the previous run is still going
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    #[default]
    Skip,
    Allow,
}

/// Scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub overlap: OverlapPolicy,
}

fn default_interval_secs() -> u64 {
    120
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            overlap: OverlapPolicy::default(),
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// A zero period cannot drive a timer
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval(self.interval_secs));
        }
        Ok(())
    }
}

/// Local artifact output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load configuration from defaults, config file and environment
    pub fn load() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (CRAWLER_STORAGE__BUCKET, etc.)
            .add_source(
                config::Environment::with_prefix("CRAWLER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            // Legacy variable names used by the deployment
            .set_override_option("storage.url", env_trimmed("SUPABASE_URL"))?
            .set_override_option("storage.key", env_trimmed("SUPABASE_KEY"))?
            .set_override_option("storage.bucket", env_trimmed("SUPABASE_BUCKET"))?
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
