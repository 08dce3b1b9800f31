//! Crawl source configuration and lifecycle statistics.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// How often an external scheduler should trigger a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    Manual,
    Hourly,
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Schedule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Schedule::Manual => "manual",
            Schedule::Hourly => "hourly",
            Schedule::Daily => "daily",
            Schedule::Weekly => "weekly",
            Schedule::Monthly => "monthly",
        }
    }

    /// Cron expression a periodic trigger should use, or `None` for manual sources.
    ///
    /// Non-hourly crawls run at 02:00; weekly crawls on Monday, monthly on the 1st.
    pub fn cron_expression(&self) -> Option<&'static str> {
        match self {
            Schedule::Manual => None,
            Schedule::Hourly => Some("0 * * * *"),
            Schedule::Daily => Some("0 2 * * *"),
            Schedule::Weekly => Some("0 2 * * 1"),
            Schedule::Monthly => Some("0 2 1 * *"),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Schedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Schedule::Manual),
            "hourly" => Ok(Schedule::Hourly),
            "daily" => Ok(Schedule::Daily),
            "weekly" => Ok(Schedule::Weekly),
            "monthly" => Ok(Schedule::Monthly),
            other => Err(Error::InvalidInput(format!("unknown schedule: {other}"))),
        }
    }
}

/// CSS selectors configured for a source. Unset entries fall back to heuristics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selectors {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

/// Lifecycle counters. Only ever incremented, once per job terminal event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub total_crawls: u32,
    pub successful_crawls: u32,
    pub failed_crawls: u32,
    pub total_posts_found: u32,
}

/// How a job ended, from the source statistics' point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    Succeeded,
    Failed,
    /// Stopped by an administrator; counts as a crawl but neither success nor failure.
    Cancelled,
}

/// A source as registered by an operator, before it has an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSource {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub selectors: Selectors,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Seconds between consecutive requests.
    #[serde(default = "default_delay")]
    pub delay_between_requests: f64,
    #[serde(default = "default_true")]
    pub follow_links: bool,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_max_pages() -> u32 {
    10
}

fn default_delay() -> f64 {
    1.0
}

impl NewSource {
    /// Minimal source with defaults for everything but name and URL.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            description: String::new(),
            schedule: Schedule::default(),
            is_active: true,
            selectors: Selectors::default(),
            max_pages: default_max_pages(),
            delay_between_requests: default_delay(),
            follow_links: true,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }

    /// Validate operator input before it reaches the store.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("source name must not be empty".into()));
        }
        let url = self.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::InvalidInput(format!("source url must be http(s): {url}")));
        }
        if self.max_pages == 0 {
            return Err(Error::InvalidInput("max_pages must be at least 1".into()));
        }
        if !self.delay_between_requests.is_finite() || self.delay_between_requests < 0.0 {
            return Err(Error::InvalidInput("delay_between_requests must be a non-negative number".into()));
        }
        Ok(())
    }
}

/// A registered crawl source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub description: String,
    pub schedule: Schedule,
    pub is_active: bool,
    pub selectors: Selectors,
    pub max_pages: u32,
    pub delay_between_requests: f64,
    pub follow_links: bool,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub stats: CrawlStats,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SourceConfig {
    /// Fraction of crawls that succeeded, 0 when the source has never been crawled.
    pub fn success_rate(&self) -> f64 {
        if self.stats.total_crawls == 0 {
            return 0.0;
        }
        f64::from(self.stats.successful_crawls) / f64::from(self.stats.total_crawls)
    }

    /// Minimum pause between consecutive fetches.
    pub fn request_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_between_requests).unwrap_or(Duration::ZERO)
    }

    /// True when no include patterns are set or the URL contains one of them.
    pub fn is_included(&self, url: &str) -> bool {
        self.include_patterns.is_empty() || self.include_patterns.iter().any(|p| url.contains(p.as_str()))
    }

    /// True when the URL contains any exclude pattern.
    pub fn is_excluded(&self, url: &str) -> bool {
        self.exclude_patterns.iter().any(|p| url.contains(p.as_str()))
    }
}
