//! Configuration management.
//!
//! Configuration is read from a TOML file with environment variable overrides
//! (`BANGUMI_RESOLVER__<SECTION>__<KEY>`, e.g. `BANGUMI_RESOLVER__FETCH__MAX_CONCURRENT=8`).
//!
//! ```toml
//! [catalog]
//! api_base = "https://api.bgm.tv"
//! site_base = "https://bangumi.tv"
//! search_limit = 10
//! include_nsfw = true
//!
//! [fetch]
//! max_concurrent = 4
//! max_retries = 2
//! initial_backoff_ms = 500
//! task_timeout_secs = 60
//! batch_timeout_secs = 120
//!
//! [rate_limits]
//! requests_per_second = 5.0
//! burst = 5
//!
//! [ranking]
//! confidence_threshold = 0.5
//! similarity = "levenshtein"
//!
//! [tags]
//! min_user_count = 5
//! max_count = 10
//!
//! [logging]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::{RetryConfig, SimilarityMeasure};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "BANGUMI_RESOLVER";

/// File name probed by [`find_config_file`]
pub const CONFIG_FILE_NAME: &str = "bangumi-resolver.toml";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub tags: TagConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Slowest accepted catalog rate: one request per hour
const MIN_REQUESTS_PER_SECOND: f32 = 1.0 / 3600.0;

impl Config {
    /// Check values that serde cannot reject on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue(
                "fetch.max_concurrent must be at least 1".to_string(),
            ));
        }
        if !(self.rate_limits.requests_per_second > 0.0) {
            return Err(ConfigError::InvalidValue(
                "rate_limits.requests_per_second must be positive".to_string(),
            ));
        }
        if self.rate_limits.requests_per_second < MIN_REQUESTS_PER_SECOND {
            return Err(ConfigError::InvalidValue(format!(
                "rate_limits.requests_per_second must be at least {}, got {}",
                MIN_REQUESTS_PER_SECOND, self.rate_limits.requests_per_second
            )));
        }
        if self.fetch.task_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "fetch.task_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.fetch.batch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "fetch.batch_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.rate_limits.burst == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limits.burst must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.ranking.confidence_threshold) {
            return Err(ConfigError::InvalidValue(format!(
                "ranking.confidence_threshold must be within [0, 1], got {}",
                self.ranking.confidence_threshold
            )));
        }
        if self.fetch.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue(
                "fetch.backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        if self.catalog.search_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "catalog.search_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

/// Remote catalog settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the JSON API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Base URL of the human-facing site, used for subject links
    #[serde(default = "default_site_base")]
    pub site_base: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum number of candidates requested from the search endpoint
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Whether adult subjects may appear in search results
    #[serde(default = "default_true")]
    pub include_nsfw: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            site_base: default_site_base(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            search_limit: default_search_limit(),
            include_nsfw: true,
        }
    }
}

fn default_api_base() -> String {
    "https://api.bgm.tv".to_string()
}

fn default_site_base() -> String {
    "https://bangumi.tv".to_string()
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_search_limit() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// Volume fan-out settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum number of volume fetches in flight
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Retries after the first attempt, for transport failures only
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Budget for one volume, retries included
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,

    /// Budget for the whole fan-out
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            task_timeout_secs: default_task_timeout(),
            batch_timeout_secs: default_batch_timeout(),
        }
    }
}

impl FetchConfig {
    /// Retry policy for volume fetches
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

fn default_max_concurrent() -> usize {
    4
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    8_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_task_timeout() -> u64 {
    60
}

fn default_batch_timeout() -> u64 {
    120
}

/// Rate limiting configuration, shared by every catalog request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rps")]
    pub requests_per_second: f32,

    /// Requests allowed back to back before the rate applies
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rps(),
            burst: default_burst(),
        }
    }
}

fn default_rps() -> f32 {
    5.0
}

fn default_burst() -> u32 {
    5
}

/// Candidate and volume matching configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Scores below this mark the match as low confidence
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    #[serde(default)]
    pub similarity: SimilarityMeasure,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            similarity: SimilarityMeasure::default(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.5
}

/// Tag filtering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagConfig {
    /// Minimum number of users who applied a tag for it to count
    #[serde(default = "default_tag_user_count")]
    pub min_user_count: u32,

    /// Maximum number of tags kept
    #[serde(default = "default_tag_count")]
    pub max_count: usize,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            min_user_count: default_tag_user_count(),
            max_count: default_tag_count(),
        }
    }
}

fn default_tag_user_count() -> u32 {
    5
}

fn default_tag_count() -> usize {
    10
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "json" for structured output, plain text otherwise
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from a file, applying environment overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let config: Config = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Get the configuration from environment overrides and defaults
pub fn get_config() -> Result<Config, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let config: Config = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Look for a configuration file in the working directory, then the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("bangumi-resolver").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Load error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fetch.max_concurrent, 4);
        assert_eq!(config.fetch.max_retries, 2);
        assert_eq!(config.rate_limits.requests_per_second, 5.0);
        assert_eq!(config.ranking.confidence_threshold, 0.5);
        assert_eq!(config.tags.min_user_count, 5);
        assert_eq!(config.tags.max_count, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let toml_content = r#"
[catalog]
api_base = "http://localhost:9000"
search_limit = 3

[fetch]
max_concurrent = 6
max_retries = 3

[rate_limits]
requests_per_second = 2.5

[ranking]
confidence_threshold = 0.6
similarity = "jaro_winkler"

[logging]
level = "debug"
"#;

        let mut file = File::create(&path).unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = load_config(&path).unwrap();

        assert_eq!(config.catalog.api_base, "http://localhost:9000");
        assert_eq!(config.catalog.search_limit, 3);
        assert_eq!(config.catalog.site_base, "https://bangumi.tv");
        assert_eq!(config.fetch.max_concurrent, 6);
        assert_eq!(config.fetch.max_retries, 3);
        assert_eq!(config.fetch.batch_timeout_secs, 120);
        assert_eq!(config.rate_limits.requests_per_second, 2.5);
        assert_eq!(config.rate_limits.burst, 5);
        assert_eq!(config.ranking.similarity, SimilarityMeasure::JaroWinkler);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.fetch.max_concurrent = 3;
        config.tags.max_count = 4;
        config.save(&path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.fetch.max_concurrent, 3);
        assert_eq!(loaded.tags.max_count, 4);
    }

    #[test]
    fn test_config_rejects_zero_concurrency() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[fetch]\nmax_concurrent = 0\n").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_config_rejects_bad_threshold() {
        let mut config = Config::default();
        config.ranking.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_vanishing_rate() {
        let mut config = Config::default();
        config.rate_limits.requests_per_second = 1e-20;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        config.rate_limits.requests_per_second = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_timeouts() {
        let mut config = Config::default();
        config.fetch.task_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let mut config = Config::default();
        config.fetch.batch_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_config_file_nonexistent() {
        let path = PathBuf::from("/nonexistent/bangumi-resolver.toml");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_retry_from_fetch_config() {
        let fetch = FetchConfig::default();
        let retry = fetch.retry();
        assert_eq!(retry.max_retries, 2);
        assert_eq!(retry.initial_delay, Duration::from_millis(500));
        assert_eq!(fetch.batch_timeout(), Duration::from_secs(120));
    }
}
