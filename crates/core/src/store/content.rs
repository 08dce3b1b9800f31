//! Crawled content records and their review transitions.

use super::connection::Store;
use super::{enum_col, json_col, opt_ts_col, to_db, ts_col};
use crate::Error;
use crate::models::{ContentRecord, NewContent, ReviewStatus};
use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

const CONTENT_COLUMNS: &str = "id, job_id, source_url, title, content, author, published_date,
    status, content_hash, similarity_score, raw_html, metadata_json,
    published_item_id, processed_at, created_at";

fn content_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContentRecord> {
    Ok(ContentRecord {
        id: row.get(0)?,
        job_id: row.get(1)?,
        source_url: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        author: row.get(5)?,
        published_date: opt_ts_col(row, 6)?,
        status: enum_col(row, 7)?,
        content_hash: row.get(8)?,
        similarity_score: row.get(9)?,
        raw_html: row.get(10)?,
        extracted_metadata: json_col(row, 11)?,
        published_item_id: row.get(12)?,
        processed_at: opt_ts_col(row, 13)?,
        created_at: ts_col(row, 14)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl Store {
    /// Whether any content record, from any job, carries this hash.
    pub async fn content_hash_exists(&self, hash: &str) -> Result<bool, Error> {
        let hash = hash.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM content WHERE content_hash = ?1)",
                    params![hash],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert a pending review record.
    ///
    /// Returns `Error::DuplicateContent` when another record already holds the
    /// same hash, which happens when two jobs race past the existence check.
    pub async fn insert_content(&self, new: &NewContent) -> Result<ContentRecord, Error> {
        let new = new.clone();
        let metadata = serde_json::to_string(&new.extracted_metadata)?;
        let published_date = new.published_date.as_ref().map(to_db);
        let created_at = to_db(&Utc::now());

        let id = self
            .conn
            .call(move |conn| -> Result<i64, Error> {
                let result = conn.execute(
                    "INSERT INTO content (
                        job_id, source_url, title, content, author, published_date,
                        status, content_hash, similarity_score, raw_html, metadata_json, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    params![
                        new.job_id,
                        &new.source_url,
                        &new.title,
                        &new.content,
                        &new.author,
                        published_date,
                        ReviewStatus::Pending.as_str(),
                        &new.content_hash,
                        new.similarity_score,
                        &new.raw_html,
                        metadata,
                        created_at,
                    ],
                );
                match result {
                    Ok(_) => Ok(conn.last_insert_rowid()),
                    Err(e) if is_unique_violation(&e) => Err(Error::DuplicateContent(new.content_hash.clone())),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        self.require_content(id).await
    }

    /// Get a content record by id.
    ///
    /// Returns None if the record doesn't exist.
    pub async fn get_content(&self, id: i64) -> Result<Option<ContentRecord>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<ContentRecord>, Error> {
                let sql = format!("SELECT {CONTENT_COLUMNS} FROM content WHERE id = ?1");
                let mut stmt = conn.prepare(&sql)?;
                match stmt.query_row(params![id], content_from_row) {
                    Ok(c) => Ok(Some(c)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    pub async fn require_content(&self, id: i64) -> Result<ContentRecord, Error> {
        self.get_content(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("content {id}")))
    }

    /// Records produced by a job, in insertion order.
    pub async fn list_content_for_job(&self, job_id: i64) -> Result<Vec<ContentRecord>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<ContentRecord>, Error> {
                let sql = format!("SELECT {CONTENT_COLUMNS} FROM content WHERE job_id = ?1 ORDER BY id ASC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![job_id], content_from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Records awaiting review, oldest first.
    pub async fn list_pending_content(&self, limit: usize) -> Result<Vec<ContentRecord>, Error> {
        let limit = limit as i64;
        self.conn
            .call(move |conn| -> Result<Vec<ContentRecord>, Error> {
                let sql = format!(
                    "SELECT {CONTENT_COLUMNS} FROM content WHERE status = 'pending' ORDER BY created_at ASC, id ASC LIMIT ?1"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![limit], content_from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Apply a reviewer decision.
    ///
    /// Only pending records move, and only once. `Processed` requires the id
    /// of the published item the record became.
    pub async fn set_review_status(
        &self, id: i64, status: ReviewStatus, published_item_id: Option<i64>,
    ) -> Result<ContentRecord, Error> {
        match (status, published_item_id) {
            (ReviewStatus::Pending, _) => {
                return Err(Error::InvalidTransition { from: "pending".into(), to: "pending".into() });
            }
            (ReviewStatus::Processed, None) => {
                return Err(Error::InvalidInput("processed content must link a published item".into()));
            }
            _ => {}
        }

        let processed_at = to_db(&Utc::now());
        let updated = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                Ok(conn.execute(
                    "UPDATE content SET status = ?2, published_item_id = ?3, processed_at = ?4
                     WHERE id = ?1 AND status = 'pending'",
                    params![id, status.as_str(), published_item_id, processed_at],
                )?)
            })
            .await
            .map_err(Error::from)?;

        let record = self.require_content(id).await?;
        if updated == 0 {
            return Err(Error::InvalidTransition { from: record.status.to_string(), to: status.to_string() });
        }
        Ok(record)
    }
}
