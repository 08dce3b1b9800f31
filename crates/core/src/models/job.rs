//! Crawl job lifecycle, counters and the append-only job log.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Job lifecycle state. Transitions only move forward:
/// pending -> running -> {completed, failed, cancelled}, or pending -> {failed, cancelled}.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// States a job may be in immediately before entering `self`.
    pub fn allowed_predecessors(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::Running => &[JobStatus::Pending],
            JobStatus::Completed => &[JobStatus::Running],
            JobStatus::Failed | JobStatus::Cancelled => &[JobStatus::Pending, JobStatus::Running],
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(Error::InvalidInput(format!("unknown job status: {other}"))),
        }
    }
}

/// Per-job result counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    pub pages_crawled: u32,
    pub posts_found: u32,
    pub posts_created: u32,
    pub duplicates_found: u32,
    pub errors_count: u32,
}

impl JobCounters {
    /// Add another set of counters into this one.
    pub fn merge(&mut self, other: &JobCounters) {
        self.pages_crawled += other.pages_crawled;
        self.posts_found += other.posts_found;
        self.posts_created += other.posts_created;
        self.duplicates_found += other.duplicates_found;
        self.errors_count += other.errors_count;
    }
}

/// One execution of a crawl against a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub source_id: i64,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub counters: JobCounters,
    pub error_message: Option<String>,
}

impl Job {
    /// Pending or running.
    pub fn is_running(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Running)
    }
}

/// Fields written when a job reaches a terminal state.
#[derive(Debug, Clone)]
pub struct JobCompletion {
    pub completed_at: DateTime<Utc>,
    pub duration_ms: Option<i64>,
    pub counters: JobCounters,
    pub error_message: Option<String>,
}

impl JobCompletion {
    /// Build a completion stamped now, deriving the duration from `started_at`.
    pub fn now(started_at: Option<DateTime<Utc>>, counters: JobCounters) -> Self {
        let completed_at = Utc::now();
        let duration_ms = started_at.map(|s| (completed_at - s).num_milliseconds());
        Self { completed_at, duration_ms, counters, error_message: None }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(Error::InvalidInput(format!("unknown log level: {other}"))),
        }
    }
}

/// Entry in a job's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JobLogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self { timestamp: Utc::now(), level, message: message.into(), extra: serde_json::Map::new() }
    }

    /// Attach a structured field.
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_forward_only() {
        assert_eq!(JobStatus::Running.allowed_predecessors(), &[JobStatus::Pending]);
        assert_eq!(JobStatus::Completed.allowed_predecessors(), &[JobStatus::Running]);
        assert!(JobStatus::Pending.allowed_predecessors().is_empty());
        for status in [JobStatus::Failed, JobStatus::Cancelled] {
            assert_eq!(status.allowed_predecessors(), &[JobStatus::Pending, JobStatus::Running]);
        }
        for status in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            assert!(!JobStatus::Running.allowed_predecessors().contains(&status));
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_parse() {
        for status in [JobStatus::Pending, JobStatus::Running, JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_counters_merge() {
        let mut total = JobCounters { pages_crawled: 1, posts_found: 2, ..Default::default() };
        total.merge(&JobCounters { pages_crawled: 1, duplicates_found: 3, errors_count: 1, ..Default::default() });
        assert_eq!(total.pages_crawled, 2);
        assert_eq!(total.posts_found, 2);
        assert_eq!(total.duplicates_found, 3);
        assert_eq!(total.errors_count, 1);
    }

    #[test]
    fn test_completion_duration() {
        let started = Utc::now() - chrono::Duration::seconds(2);
        let completion = JobCompletion::now(Some(started), JobCounters::default());
        assert!(completion.duration_ms.unwrap() >= 2000);
        assert!(JobCompletion::now(None, JobCounters::default()).duration_ms.is_none());
    }

    #[test]
    fn test_log_entry_extra() {
        let entry = JobLogEntry::new(LogLevel::Info, "page fetched").with("url", "https://x.com/").with("bytes", 512);
        assert_eq!(entry.extra["url"], "https://x.com/");
        assert_eq!(entry.extra["bytes"], 512);
    }
}
