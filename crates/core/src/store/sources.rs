//! Source registration and lifecycle statistics.

use super::connection::Store;
use super::{enum_col, json_col, opt_ts_col, to_db, ts_col};
use crate::Error;
use crate::models::{CrawlOutcome, CrawlStats, NewSource, Selectors, SourceConfig};
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

const SOURCE_COLUMNS: &str = "id, name, url, description, schedule, is_active,
    content_selector, title_selector, author_selector, date_selector,
    max_pages, delay_between_requests, follow_links, include_patterns, exclude_patterns,
    total_crawls, successful_crawls, failed_crawls, total_posts_found, last_crawled_at, created_at";

fn source_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SourceConfig> {
    Ok(SourceConfig {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        description: row.get(3)?,
        schedule: enum_col(row, 4)?,
        is_active: row.get(5)?,
        selectors: Selectors { content: row.get(6)?, title: row.get(7)?, author: row.get(8)?, date: row.get(9)? },
        max_pages: row.get(10)?,
        delay_between_requests: row.get(11)?,
        follow_links: row.get(12)?,
        include_patterns: json_col(row, 13)?,
        exclude_patterns: json_col(row, 14)?,
        stats: CrawlStats {
            total_crawls: row.get(15)?,
            successful_crawls: row.get(16)?,
            failed_crawls: row.get(17)?,
            total_posts_found: row.get(18)?,
        },
        last_crawled_at: opt_ts_col(row, 19)?,
        created_at: ts_col(row, 20)?,
    })
}

/// Blank selectors are stored as NULL so they fall back to heuristics.
fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

impl Store {
    /// Register a new crawl source.
    pub async fn insert_source(&self, source: &NewSource) -> Result<SourceConfig, Error> {
        source.validate()?;
        let source = source.clone();
        let include = serde_json::to_string(&source.include_patterns)?;
        let exclude = serde_json::to_string(&source.exclude_patterns)?;
        let created_at = to_db(&Utc::now());

        let id = self
            .conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO sources (
                        name, url, description, schedule, is_active,
                        content_selector, title_selector, author_selector, date_selector,
                        max_pages, delay_between_requests, follow_links,
                        include_patterns, exclude_patterns, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    params![
                        source.name.trim(),
                        source.url.trim(),
                        &source.description,
                        source.schedule.as_str(),
                        source.is_active,
                        non_blank(&source.selectors.content),
                        non_blank(&source.selectors.title),
                        non_blank(&source.selectors.author),
                        non_blank(&source.selectors.date),
                        source.max_pages,
                        source.delay_between_requests,
                        source.follow_links,
                        include,
                        exclude,
                        created_at,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)?;

        tracing::info!(source_id = id, "registered source");
        self.require_source(id).await
    }

    /// Get a source by id.
    ///
    /// Returns None if no such source exists.
    pub async fn get_source(&self, id: i64) -> Result<Option<SourceConfig>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<SourceConfig>, Error> {
                let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?1");
                let mut stmt = conn.prepare(&sql)?;
                match stmt.query_row(params![id], source_from_row) {
                    Ok(s) => Ok(Some(s)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Get a source by id, failing with `NotFound` when absent.
    pub async fn require_source(&self, id: i64) -> Result<SourceConfig, Error> {
        self.get_source(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("source {id}")))
    }

    /// List sources, newest first.
    pub async fn list_sources(&self, active_only: bool) -> Result<Vec<SourceConfig>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<SourceConfig>, Error> {
                let filter = if active_only { "WHERE is_active = 1" } else { "" };
                let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources {filter} ORDER BY created_at DESC, id DESC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], source_from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Fold one terminal job event into the source statistics.
    ///
    /// Counters are incremented in SQL, so the update is a single statement
    /// rather than a read-modify-write.
    pub async fn record_crawl_outcome(
        &self, source_id: i64, outcome: CrawlOutcome, posts_found: u32, at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let (succeeded, failed) = match outcome {
            CrawlOutcome::Succeeded => (1, 0),
            CrawlOutcome::Failed => (0, 1),
            CrawlOutcome::Cancelled => (0, 0),
        };
        let at = to_db(&at);
        let updated = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                Ok(conn.execute(
                    "UPDATE sources SET
                        total_crawls = total_crawls + 1,
                        successful_crawls = successful_crawls + ?2,
                        failed_crawls = failed_crawls + ?3,
                        total_posts_found = total_posts_found + ?4,
                        last_crawled_at = ?5
                    WHERE id = ?1",
                    params![source_id, succeeded, failed, posts_found, at],
                )?)
            })
            .await
            .map_err(Error::from)?;

        if updated == 0 {
            return Err(Error::NotFound(format!("source {source_id}")));
        }
        Ok(())
    }
}
