//! Drives one crawl job from `pending` to a terminal state.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gleaner_core::models::{CrawlOutcome, JobCompletion, JobCounters, JobLogEntry, JobStatus, LogLevel, SourceConfig};
use gleaner_core::{AppConfig, Error, Store};
use serde::Serialize;
use serde_json::Value;

use crate::context::{CandidateOutcome, JobRunContext};
use crate::dedup::{DedupGate, DedupVerdict};
use crate::error::JobError;
use crate::extract::{ArticleCandidate, ArticleExtractor, ExtractRules, follow_targets};
use crate::fetch::{PageFetcher, PageSource, canonicalize};
use crate::ingest::ContentStore;
use crate::similarity::SimilarityScorer;

/// Final figures of a job run.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: i64,
    pub source_id: i64,
    pub status: JobStatus,
    pub counters: JobCounters,
    pub duration_ms: Option<i64>,
    pub outcomes: Vec<CandidateOutcome>,
}

enum Flow {
    Finished,
    Cancelled,
}

/// Per-run stages, built once the source is known.
struct Stages {
    extractor: ArticleExtractor,
    scorer: SimilarityScorer,
    dedup: DedupGate,
    ingest: ContentStore,
}

pub struct JobController {
    store: Store,
    pages: Arc<dyn PageSource>,
    config: AppConfig,
    rules: ExtractRules,
}

impl JobController {
    pub fn new(store: Store, pages: Arc<dyn PageSource>, config: AppConfig) -> Self {
        Self { store, pages, config, rules: ExtractRules::default() }
    }

    pub fn with_rules(mut self, rules: ExtractRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Execute a pending job to completion.
    ///
    /// Fatal failures mark the job `failed`, update the source statistics and
    /// are returned; retrying is up to the caller.
    pub async fn run(&self, job_id: i64) -> Result<JobSummary, JobError> {
        let job = self.store.require_job(job_id).await?;
        let source = Arc::new(self.store.require_source(job.source_id).await?);

        let started_at = Utc::now();
        self.store.start_job(job_id, started_at).await?;
        self.log(
            job_id,
            JobLogEntry::new(LogLevel::Info, "job started")
                .with("source_id", source.id)
                .with("url", source.url.as_str()),
        )
        .await;

        let mut ctx = JobRunContext::new(job_id, Arc::clone(&source));
        let flow = self.crawl(&mut ctx, &source).await;
        let completion = JobCompletion::now(Some(started_at), *ctx.counters());

        let status = match flow {
            Ok(Flow::Finished) => self.complete(&ctx, &completion).await?,
            Ok(Flow::Cancelled) => {
                self.close_cancelled(&ctx, &completion).await?;
                JobStatus::Cancelled
            }
            Err(e) => {
                self.fail(&ctx, completion, &e).await;
                return Err(e);
            }
        };

        Ok(JobSummary {
            job_id,
            source_id: source.id,
            status,
            counters: *ctx.counters(),
            duration_ms: completion.duration_ms,
            outcomes: ctx.outcomes().to_vec(),
        })
    }

    async fn crawl(&self, ctx: &mut JobRunContext, source: &SourceConfig) -> Result<Flow, JobError> {
        let job_id = ctx.job_id();
        let root = canonicalize(&source.url)
            .map_err(|e| JobError::RootFetch { url: source.url.clone(), source: e.into() })?;

        let stages = Stages {
            extractor: ArticleExtractor::new(source, &self.rules)?,
            scorer: SimilarityScorer::load(&self.store, &self.config).await?,
            dedup: DedupGate::new(self.store.clone()),
            ingest: ContentStore::new(self.store.clone()),
        };
        self.log(
            job_id,
            JobLogEntry::new(LogLevel::Debug, "similarity corpus loaded").with("items", stages.scorer.corpus_len()),
        )
        .await;
        let mut fetcher = PageFetcher::new(Arc::clone(&self.pages), source.request_delay());
        let mut queue = VecDeque::from([root.clone()]);

        while let Some(url) = queue.pop_front() {
            if ctx.pages_remaining() == 0 {
                break;
            }
            if self.store.job_status(job_id).await? == JobStatus::Cancelled {
                self.log(job_id, JobLogEntry::new(LogLevel::Warning, "cancellation observed").with("next_url", url.as_str()))
                    .await;
                return Ok(Flow::Cancelled);
            }
            if ctx.has_visited(url.as_str()) {
                continue;
            }

            let is_root = url == root;
            let result = fetcher.fetch(ctx, url.as_str()).await;
            ctx.record_visit(url.as_str());

            let page = match result {
                Ok(page) => page,
                Err(e) if is_root => return Err(JobError::RootFetch { url: url.to_string(), source: e }),
                Err(e) if e.is_gate() => continue,
                Err(e) => {
                    ctx.record_error();
                    self.store.update_job_counters(job_id, ctx.counters()).await?;
                    self.log(
                        job_id,
                        JobLogEntry::new(LogLevel::Warning, "page fetch failed")
                            .with("url", url.as_str())
                            .with("error", e.to_string()),
                    )
                    .await;
                    continue;
                }
            };
            ctx.record_page();

            let extraction = stages.extractor.extract(&page.html, &page.final_url);
            let found = extraction.candidates.len();
            for skipped in extraction.skipped {
                ctx.record_outcome(CandidateOutcome::Skipped { url: skipped.url, reason: skipped.reason });
            }
            for candidate in &extraction.candidates {
                let outcome = self.process(&stages, job_id, candidate).await;
                ctx.record_outcome(outcome);
            }

            if source.follow_links {
                for link in follow_targets(&extraction.links, &root, source) {
                    let Ok(link) = canonicalize(link.as_str()) else { continue };
                    if !ctx.has_visited(link.as_str()) && !queue.contains(&link) {
                        queue.push_back(link);
                    }
                }
            }

            self.store.update_job_counters(job_id, ctx.counters()).await?;
            self.log(
                job_id,
                JobLogEntry::new(LogLevel::Info, "page crawled")
                    .with("url", url.as_str())
                    .with("fetch_ms", page.fetch_ms)
                    .with("candidates", found)
                    .with("queued", queue.len()),
            )
            .await;
        }

        Ok(Flow::Finished)
    }

    async fn process(&self, stages: &Stages, job_id: i64, candidate: &ArticleCandidate) -> CandidateOutcome {
        let outcome = match stages.dedup.check(candidate).await {
            Ok(DedupVerdict::Duplicate { hash }) => CandidateOutcome::Duplicate { title: candidate.title.clone(), hash },
            Ok(DedupVerdict::Fresh { hash }) => {
                let similarity = stages.scorer.score(&candidate.content);
                if similarity > self.config.duplicate_threshold {
                    self.log(
                        job_id,
                        JobLogEntry::new(LogLevel::Warning, "content resembles published item")
                            .with("title", candidate.title.as_str())
                            .with("similarity", similarity),
                    )
                    .await;
                }
                stages.ingest.ingest(candidate, &hash, similarity, job_id).await
            }
            Err(e) => CandidateOutcome::Failed { title: candidate.title.clone(), error: e.to_string() },
        };

        if let CandidateOutcome::Failed { title, error } = &outcome {
            self.log(
                job_id,
                JobLogEntry::new(LogLevel::Error, "failed to process content")
                    .with("title", title.as_str())
                    .with("error", error.as_str()),
            )
            .await;
        }
        outcome
    }

    async fn complete(&self, ctx: &JobRunContext, completion: &JobCompletion) -> Result<JobStatus, JobError> {
        let job_id = ctx.job_id();
        match self.store.finish_job(job_id, JobStatus::Completed, completion).await {
            Ok(()) => {}
            Err(Error::InvalidTransition { .. }) => {
                self.close_cancelled(ctx, completion).await?;
                return Ok(JobStatus::Cancelled);
            }
            Err(e) => return Err(e.into()),
        }

        self.record_stats(ctx, CrawlOutcome::Succeeded, completion.completed_at).await?;
        let c = completion.counters;
        self.log(
            job_id,
            JobLogEntry::new(LogLevel::Info, "job completed")
                .with("pages_crawled", c.pages_crawled)
                .with("posts_found", c.posts_found)
                .with("posts_created", c.posts_created)
                .with("duplicates_found", c.duplicates_found)
                .with("errors_count", c.errors_count)
                .with("duration_ms", completion.duration_ms),
        )
        .await;
        Ok(JobStatus::Completed)
    }

    async fn close_cancelled(&self, ctx: &JobRunContext, completion: &JobCompletion) -> Result<(), JobError> {
        self.store.close_cancelled_job(ctx.job_id(), completion).await?;
        self.record_stats(ctx, CrawlOutcome::Cancelled, completion.completed_at).await?;
        self.log(
            ctx.job_id(),
            JobLogEntry::new(LogLevel::Warning, "job cancelled").with("pages_crawled", completion.counters.pages_crawled),
        )
        .await;
        Ok(())
    }

    /// Best effort: the triggering error is returned to the caller regardless.
    async fn fail(&self, ctx: &JobRunContext, completion: JobCompletion, error: &JobError) {
        let job_id = ctx.job_id();
        let completion = completion.with_error(error.to_string());

        let outcome = match self.store.finish_job(job_id, JobStatus::Failed, &completion).await {
            Ok(()) => Some(CrawlOutcome::Failed),
            Err(Error::InvalidTransition { from, .. }) if from == JobStatus::Cancelled.as_str() => {
                match self.store.close_cancelled_job(job_id, &completion).await {
                    Ok(()) => Some(CrawlOutcome::Cancelled),
                    Err(e) => {
                        tracing::error!(job_id, error = %e, "failed to close cancelled job");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "failed to mark job as failed");
                None
            }
        };

        if let Some(outcome) = outcome
            && let Err(e) = self.record_stats(ctx, outcome, completion.completed_at).await
        {
            tracing::error!(job_id, error = %e, "failed to update source statistics");
        }

        self.log(job_id, JobLogEntry::new(LogLevel::Error, "job failed").with("error", error.to_string())).await;
    }

    async fn record_stats(&self, ctx: &JobRunContext, outcome: CrawlOutcome, at: DateTime<Utc>) -> Result<(), Error> {
        self.store.record_crawl_outcome(ctx.source().id, outcome, ctx.counters().posts_found, at).await
    }

    /// Emit an event through tracing and append it to the job log.
    ///
    /// A job log write failure is reported but never fails the job.
    async fn log(&self, job_id: i64, entry: JobLogEntry) {
        let extra = Value::Object(entry.extra.clone());
        match entry.level {
            LogLevel::Debug => tracing::debug!(job_id, extra = %extra, "{}", entry.message),
            LogLevel::Info => tracing::info!(job_id, extra = %extra, "{}", entry.message),
            LogLevel::Warning => tracing::warn!(job_id, extra = %extra, "{}", entry.message),
            LogLevel::Error => tracing::error!(job_id, extra = %extra, "{}", entry.message),
        }

        if let Err(e) = self.store.append_job_log(job_id, &entry).await {
            tracing::warn!(job_id, error = %e, "failed to append job log");
        }
    }
}
