//! Crawled content awaiting review, and the published corpus it is compared against.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Review state of a crawled item. Moves out of `Pending` once, driven by reviewers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    /// Turned into a published item; the record links to it.
    Processed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::Processed => "processed",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            "processed" => Ok(ReviewStatus::Processed),
            other => Err(Error::InvalidInput(format!("unknown review status: {other}"))),
        }
    }
}

/// Content ready to be inserted as a pending review record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContent {
    pub job_id: i64,
    pub source_url: String,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub content_hash: String,
    pub similarity_score: Option<f64>,
    pub raw_html: String,
    pub extracted_metadata: serde_json::Map<String, serde_json::Value>,
}

/// A persisted crawled item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: i64,
    /// Cleared when the originating job is purged.
    pub job_id: Option<i64>,
    pub source_url: String,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub status: ReviewStatus,
    pub content_hash: String,
    pub similarity_score: Option<f64>,
    pub raw_html: String,
    pub extracted_metadata: serde_json::Map<String, serde_json::Value>,
    pub published_item_id: Option<i64>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ContentRecord {
    /// Whether the similarity score marks this as a probable near-duplicate.
    pub fn is_likely_duplicate(&self, threshold: f64) -> bool {
        self.similarity_score.is_some_and(|s| s > threshold)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    Draft,
    #[default]
    Published,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Draft => "draft",
            PublicationStatus::Published => "published",
        }
    }
}

impl FromStr for PublicationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PublicationStatus::Draft),
            "published" => Ok(PublicationStatus::Published),
            other => Err(Error::InvalidInput(format!("unknown publication status: {other}"))),
        }
    }
}

/// An item of the published corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedItem {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub status: PublicationStatus,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPublishedItem {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub status: PublicationStatus,
    #[serde(default = "Utc::now")]
    pub published_at: DateTime<Utc>,
}
