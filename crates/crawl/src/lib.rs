//! Crawl pipeline for gleaner.
//!
//! This crate provides the rate-limited page fetcher, selector-driven article
//! extraction, duplicate and similarity checks, and the job controller that
//! ties them together on top of the `gleaner-core` store.

pub mod context;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod ingest;
pub mod pipeline;
pub mod similarity;

#[cfg(test)]
mod testing;

pub use context::{CandidateOutcome, JobRunContext};
pub use dedup::{DedupGate, DedupVerdict};
pub use error::JobError;
pub use extract::{ArticleCandidate, ArticleExtractor, ExtractError, ExtractRules, PageExtraction, SkipReason};
pub use fetch::{FetchConfig, FetchError, FetchedPage, HttpSource, PageFetcher, PageSource};
pub use ingest::ContentStore;
pub use pipeline::{JobController, JobDispatcher, JobSummary, Submission};
pub use similarity::SimilarityScorer;
