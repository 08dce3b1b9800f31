//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (GLEANER_*)
//! 2. TOML config file (if GLEANER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (GLEANER_*)
/// 2. TOML config file (if GLEANER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database.
    ///
    /// Set via GLEANER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for crawl requests.
    ///
    /// Set via GLEANER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds. Fixed for the lifetime of a fetcher.
    ///
    /// Set via GLEANER_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes accepted per fetched page.
    ///
    /// Set via GLEANER_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Number of most recently published items used as the similarity corpus.
    ///
    /// Set via GLEANER_SIMILARITY_SAMPLE_SIZE environment variable.
    #[serde(default = "default_similarity_sample_size")]
    pub similarity_sample_size: usize,

    /// Vocabulary bound for the TF-IDF vector space.
    ///
    /// Set via GLEANER_MAX_FEATURES environment variable.
    #[serde(default = "default_max_features")]
    pub max_features: usize,

    /// Similarity above which review tooling should flag a likely duplicate.
    ///
    /// Set via GLEANER_DUPLICATE_THRESHOLD environment variable.
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,

    /// Age in days after which finished jobs are purged.
    ///
    /// Set via GLEANER_JOB_RETENTION_DAYS environment variable.
    #[serde(default = "default_job_retention_days")]
    pub job_retention_days: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./gleaner.sqlite")
}

fn default_user_agent() -> String {
    "gleaner/0.1".into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_similarity_sample_size() -> usize {
    100
}

fn default_max_features() -> usize {
    1000
}

fn default_duplicate_threshold() -> f64 {
    0.8
}

fn default_job_retention_days() -> u32 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            similarity_sample_size: default_similarity_sample_size(),
            max_features: default_max_features(),
            duplicate_threshold: default_duplicate_threshold(),
            job_retention_days: default_job_retention_days(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `GLEANER_`
    /// 2. TOML file from `GLEANER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("GLEANER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("GLEANER_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
