//! Command execution against the store.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use chrono::{Duration, Utc};
use figment::Figment;
use figment::providers::{Format, Toml};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use gleaner_core::models::{NewPublishedItem, NewSource};
use gleaner_core::{AppConfig, Store};
use gleaner_crawl::{FetchConfig, HttpSource, JobController, JobDispatcher, PageSource};

use crate::cli::Command;

pub struct App {
    config: AppConfig,
    store: Store,
}

impl App {
    pub async fn open(config: AppConfig) -> Result<Self> {
        let store = Store::open(&config.db_path)
            .await
            .with_context(|| format!("opening database {}", config.db_path.display()))?;
        Ok(Self::new(config, store))
    }

    pub fn new(config: AppConfig, store: Store) -> Self {
        Self { config, store }
    }

    /// Run one command and return its JSON report.
    pub async fn execute(&self, command: Command) -> Result<Value> {
        match command {
            Command::AddSource { file } => self.add_source(read_toml(&file)?).await,
            Command::Sources { all } => Ok(serde_json::to_value(self.store.list_sources(!all).await?)?),
            Command::Crawl { source_id } => {
                let pages = HttpSource::new(FetchConfig::from(&self.config))?;
                self.crawl(source_id, Arc::new(pages)).await
            }
            Command::Job { job_id } => self.job(job_id).await,
            Command::Cancel { job_id } => {
                self.store.cancel_job(job_id).await?;
                self.job(job_id).await
            }
            Command::Publish { file } => self.publish(read_toml(&file)?).await,
            Command::PurgeJobs { days } => self.purge_jobs(days.unwrap_or(self.config.job_retention_days)).await,
        }
    }

    async fn add_source(&self, new: NewSource) -> Result<Value> {
        new.validate()?;
        let source = self.store.insert_source(&new).await?;
        tracing::info!(source_id = source.id, name = %source.name, url = %source.url, "source registered");
        Ok(serde_json::to_value(source)?)
    }

    async fn crawl(&self, source_id: i64, pages: Arc<dyn PageSource>) -> Result<Value> {
        let controller = JobController::new(self.store.clone(), pages, self.config.clone());
        let submission = JobDispatcher::new(controller).submit(source_id).await?;
        let summary = submission
            .handle
            .await
            .context("crawl task panicked")?
            .with_context(|| format!("job {} failed", submission.job_id))?;
        Ok(serde_json::to_value(summary)?)
    }

    async fn job(&self, job_id: i64) -> Result<Value> {
        let job = self.store.require_job(job_id).await?;
        let logs = self.store.job_logs(job_id).await?;
        let content = self.store.list_content_for_job(job_id).await?;
        let content: Vec<Value> = content
            .into_iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "title": c.title,
                    "source_url": c.source_url,
                    "status": c.status,
                    "similarity_score": c.similarity_score,
                    "likely_duplicate": c.is_likely_duplicate(self.config.duplicate_threshold),
                })
            })
            .collect();
        Ok(json!({ "job": job, "logs": logs, "content": content }))
    }

    async fn publish(&self, item: NewPublishedItem) -> Result<Value> {
        ensure!(!item.content.trim().is_empty(), "published item content must not be empty");
        let item = self.store.insert_published(&item).await?;
        Ok(serde_json::to_value(item)?)
    }

    async fn purge_jobs(&self, days: u32) -> Result<Value> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let deleted = self.store.purge_jobs_older_than(cutoff).await?;
        tracing::info!(deleted, days, "purged old jobs");
        Ok(json!({ "deleted": deleted, "cutoff": cutoff }))
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    ensure!(path.is_file(), "no such file: {}", path.display());
    parse(Figment::from(Toml::file(path))).with_context(|| format!("reading {}", path.display()))
}

fn parse<T: DeserializeOwned>(figment: Figment) -> Result<T> {
    Ok(figment.extract()?)
}
