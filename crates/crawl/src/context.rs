//! Run-scoped state threaded through one job.
//!
//! Stages borrow the context immutably and hand back outcomes; only the
//! controller folds those outcomes in, so each stage can be tested on its own.

use std::collections::HashSet;
use std::sync::Arc;

use gleaner_core::models::{JobCounters, SourceConfig};
use serde::Serialize;

use crate::extract::SkipReason;

/// What happened to one extracted element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CandidateOutcome {
    /// Persisted for review.
    Accepted { content_id: i64, title: String, similarity: f64 },
    /// Same fingerprint already stored.
    Duplicate { title: String, hash: String },
    /// Rejected by the validity gate.
    Skipped { url: String, reason: SkipReason },
    /// Persistence failed for a reason other than a duplicate.
    Failed { title: String, error: String },
}

impl CandidateOutcome {
    /// Counter deltas this outcome contributes.
    pub fn counters(&self) -> JobCounters {
        match self {
            CandidateOutcome::Accepted { .. } => JobCounters { posts_found: 1, posts_created: 1, ..Default::default() },
            CandidateOutcome::Duplicate { .. } => JobCounters { duplicates_found: 1, ..Default::default() },
            CandidateOutcome::Skipped { .. } => JobCounters::default(),
            CandidateOutcome::Failed { .. } => JobCounters { errors_count: 1, ..Default::default() },
        }
    }
}

/// Accumulated state of one job run.
#[derive(Debug, Clone)]
pub struct JobRunContext {
    job_id: i64,
    source: Arc<SourceConfig>,
    counters: JobCounters,
    visited: HashSet<String>,
    outcomes: Vec<CandidateOutcome>,
}

impl JobRunContext {
    pub fn new(job_id: i64, source: Arc<SourceConfig>) -> Self {
        Self { job_id, source, counters: JobCounters::default(), visited: HashSet::new(), outcomes: Vec::new() }
    }

    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    pub fn counters(&self) -> &JobCounters {
        &self.counters
    }

    pub fn outcomes(&self) -> &[CandidateOutcome] {
        &self.outcomes
    }

    pub fn has_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    /// Pages still allowed under the source's budget.
    pub fn pages_remaining(&self) -> u32 {
        self.source.max_pages.saturating_sub(self.counters.pages_crawled)
    }

    /// Mark a canonical URL as attempted. Failed attempts are not retried.
    pub fn record_visit(&mut self, url: impl Into<String>) {
        self.visited.insert(url.into());
    }

    pub fn record_page(&mut self) {
        self.counters.pages_crawled += 1;
    }

    pub fn record_error(&mut self) {
        self.counters.errors_count += 1;
    }

    pub fn record_outcome(&mut self, outcome: CandidateOutcome) {
        self.counters.merge(&outcome.counters());
        self.outcomes.push(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::make_context;

    #[test]
    fn test_outcomes_merge_counters() {
        let mut ctx = make_context(5);
        ctx.record_outcome(CandidateOutcome::Accepted { content_id: 1, title: "A".into(), similarity: 0.1 });
        ctx.record_outcome(CandidateOutcome::Accepted { content_id: 2, title: "B".into(), similarity: 0.0 });
        ctx.record_outcome(CandidateOutcome::Duplicate { title: "A".into(), hash: "h".into() });
        ctx.record_outcome(CandidateOutcome::Skipped { url: "https://x.com/".into(), reason: SkipReason::MissingTitle });
        ctx.record_outcome(CandidateOutcome::Failed { title: "C".into(), error: "db".into() });

        let c = ctx.counters();
        assert_eq!(c.posts_found, 2);
        assert_eq!(c.posts_created, 2);
        assert_eq!(c.duplicates_found, 1);
        assert_eq!(c.errors_count, 1);
        assert_eq!(ctx.outcomes().len(), 5);
    }

    #[test]
    fn test_pages_remaining() {
        let mut ctx = make_context(2);
        assert_eq!(ctx.pages_remaining(), 2);
        ctx.record_page();
        ctx.record_page();
        ctx.record_page();
        assert_eq!(ctx.pages_remaining(), 0);
    }

    #[test]
    fn test_visited() {
        let mut ctx = make_context(2);
        assert!(!ctx.has_visited("https://x.com/"));
        ctx.record_visit("https://x.com/");
        assert!(ctx.has_visited("https://x.com/"));
    }
}
