//! Domain model shared by the store and the crawl pipeline.

pub mod content;
pub mod job;
pub mod source;

pub use content::{ContentRecord, NewContent, NewPublishedItem, PublicationStatus, PublishedItem, ReviewStatus};
pub use job::{Job, JobCompletion, JobCounters, JobLogEntry, JobStatus, LogLevel};
pub use source::{CrawlOutcome, CrawlStats, NewSource, Schedule, Selectors, SourceConfig};
