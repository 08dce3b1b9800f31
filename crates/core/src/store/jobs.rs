//! Job rows, guarded status transitions and the job log.

use super::connection::Store;
use super::{enum_col, json_col, opt_ts_col, to_db, ts_col};
use crate::Error;
use crate::models::{Job, JobCompletion, JobCounters, JobLogEntry, JobStatus};
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

const JOB_COLUMNS: &str = "id, source_id, status, created_at, started_at, completed_at, duration_ms,
    pages_crawled, posts_found, posts_created, duplicates_found, errors_count, error_message";

fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        source_id: row.get(1)?,
        status: enum_col(row, 2)?,
        created_at: ts_col(row, 3)?,
        started_at: opt_ts_col(row, 4)?,
        completed_at: opt_ts_col(row, 5)?,
        duration_ms: row.get(6)?,
        counters: JobCounters {
            pages_crawled: row.get(7)?,
            posts_found: row.get(8)?,
            posts_created: row.get(9)?,
            duplicates_found: row.get(10)?,
            errors_count: row.get(11)?,
        },
        error_message: row.get(12)?,
    })
}

/// `'a', 'b'` list for an SQL `IN` clause. Values come from `JobStatus::as_str`.
fn status_list(statuses: &[JobStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Store {
    /// Create a pending job for a source.
    pub async fn create_job(&self, source_id: i64) -> Result<Job, Error> {
        self.require_source(source_id).await?;
        let created_at = to_db(&Utc::now());
        let id = self
            .conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO jobs (source_id, status, created_at) VALUES (?1, ?2, ?3)",
                    params![source_id, JobStatus::Pending.as_str(), created_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)?;

        tracing::debug!(job_id = id, source_id, "created job");
        self.require_job(id).await
    }

    /// Get a job by id.
    ///
    /// Returns None if the job doesn't exist.
    pub async fn get_job(&self, id: i64) -> Result<Option<Job>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<Job>, Error> {
                let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1");
                let mut stmt = conn.prepare(&sql)?;
                match stmt.query_row(params![id], job_from_row) {
                    Ok(j) => Ok(Some(j)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Get a job by id, failing with `NotFound` when absent.
    pub async fn require_job(&self, id: i64) -> Result<Job, Error> {
        self.get_job(id).await?.ok_or_else(|| Error::NotFound(format!("job {id}")))
    }

    /// Jobs for a source, newest first.
    pub async fn list_jobs_for_source(&self, source_id: i64) -> Result<Vec<Job>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<Job>, Error> {
                let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE source_id = ?1 ORDER BY created_at DESC, id DESC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![source_id], job_from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Current status of a job. Used by the controller to observe cancellation.
    pub async fn job_status(&self, id: i64) -> Result<JobStatus, Error> {
        self.conn
            .call(move |conn| -> Result<JobStatus, Error> {
                match conn.query_row("SELECT status FROM jobs WHERE id = ?1", params![id], |row| enum_col(row, 0)) {
                    Ok(s) => Ok(s),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::NotFound(format!("job {id}"))),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Move a pending job to running.
    ///
    /// Fails with `InvalidTransition` if the job is not pending.
    pub async fn start_job(&self, id: i64, started_at: DateTime<Utc>) -> Result<(), Error> {
        let started = to_db(&started_at);
        let predecessors = status_list(JobStatus::Running.allowed_predecessors());
        let updated = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let sql = format!("UPDATE jobs SET status = ?2, started_at = ?3 WHERE id = ?1 AND status IN ({predecessors})");
                Ok(conn.execute(&sql, params![id, JobStatus::Running.as_str(), started])?)
            })
            .await
            .map_err(Error::from)?;

        if updated == 0 {
            return Err(self.rejected_transition(id, JobStatus::Running).await);
        }
        Ok(())
    }

    /// Persist the counters accumulated so far. Only applies while the job runs.
    pub async fn update_job_counters(&self, id: i64, counters: &JobCounters) -> Result<(), Error> {
        let c = *counters;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "UPDATE jobs SET
                        pages_crawled = ?2, posts_found = ?3, posts_created = ?4,
                        duplicates_found = ?5, errors_count = ?6
                    WHERE id = ?1 AND status = 'running'",
                    params![id, c.pages_crawled, c.posts_found, c.posts_created, c.duplicates_found, c.errors_count],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Move a job into a terminal state and record its final figures.
    ///
    /// The update only applies from an allowed predecessor state, so a terminal
    /// status is written once and never revised. Fails with `InvalidTransition`
    /// otherwise.
    pub async fn finish_job(&self, id: i64, status: JobStatus, completion: &JobCompletion) -> Result<(), Error> {
        if !status.is_terminal() {
            return Err(Error::InvalidInput(format!("{status} is not a terminal status")));
        }
        let completion = completion.clone();
        let predecessors = status_list(status.allowed_predecessors());
        let updated = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let c = completion.counters;
                let sql = format!(
                    "UPDATE jobs SET
                        status = ?2, completed_at = ?3, duration_ms = ?4, error_message = ?5,
                        pages_crawled = ?6, posts_found = ?7, posts_created = ?8,
                        duplicates_found = ?9, errors_count = ?10
                    WHERE id = ?1 AND status IN ({predecessors})"
                );
                Ok(conn.execute(
                    &sql,
                    params![
                        id,
                        status.as_str(),
                        to_db(&completion.completed_at),
                        completion.duration_ms,
                        completion.error_message,
                        c.pages_crawled,
                        c.posts_found,
                        c.posts_created,
                        c.duplicates_found,
                        c.errors_count,
                    ],
                )?)
            })
            .await
            .map_err(Error::from)?;

        if updated == 0 {
            return Err(self.rejected_transition(id, status).await);
        }
        Ok(())
    }

    /// Record the final figures of a job an administrator already cancelled.
    pub async fn close_cancelled_job(&self, id: i64, completion: &JobCompletion) -> Result<(), Error> {
        let completion = completion.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let c = completion.counters;
                conn.execute(
                    "UPDATE jobs SET
                        completed_at = COALESCE(completed_at, ?2), duration_ms = ?3,
                        pages_crawled = ?4, posts_found = ?5, posts_created = ?6,
                        duplicates_found = ?7, errors_count = ?8
                    WHERE id = ?1 AND status = 'cancelled'",
                    params![
                        id,
                        to_db(&completion.completed_at),
                        completion.duration_ms,
                        c.pages_crawled,
                        c.posts_found,
                        c.posts_created,
                        c.duplicates_found,
                        c.errors_count,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Administratively cancel a pending or running job.
    ///
    /// A running job notices at its next page boundary.
    pub async fn cancel_job(&self, id: i64) -> Result<(), Error> {
        let predecessors = status_list(JobStatus::Cancelled.allowed_predecessors());
        let updated = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let sql = format!("UPDATE jobs SET status = 'cancelled' WHERE id = ?1 AND status IN ({predecessors})");
                Ok(conn.execute(&sql, params![id])?)
            })
            .await
            .map_err(Error::from)?;

        if updated == 0 {
            return Err(self.rejected_transition(id, JobStatus::Cancelled).await);
        }
        tracing::info!(job_id = id, "job cancelled");
        Ok(())
    }

    async fn rejected_transition(&self, id: i64, to: JobStatus) -> Error {
        match self.job_status(id).await {
            Ok(from) => Error::InvalidTransition { from: from.to_string(), to: to.to_string() },
            Err(e) => e,
        }
    }

    /// Append an entry to a job's log.
    pub async fn append_job_log(&self, job_id: i64, entry: &JobLogEntry) -> Result<(), Error> {
        let timestamp = to_db(&entry.timestamp);
        let level = entry.level.as_str();
        let message = entry.message.clone();
        let extra = serde_json::to_string(&entry.extra)?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO job_logs (job_id, timestamp, level, message, extra_json) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![job_id, timestamp, level, message, extra],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// A job's log in insertion order.
    pub async fn job_logs(&self, job_id: i64) -> Result<Vec<JobLogEntry>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<JobLogEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT timestamp, level, message, extra_json FROM job_logs WHERE job_id = ?1 ORDER BY id ASC",
                )?;
                let rows = stmt.query_map(params![job_id], |row| {
                    Ok(JobLogEntry {
                        timestamp: ts_col(row, 0)?,
                        level: enum_col(row, 1)?,
                        message: row.get(2)?,
                        extra: json_col(row, 3)?,
                    })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete finished jobs created before `cutoff`, with their logs.
    ///
    /// Pending and running jobs are kept. Returns the number of deleted jobs.
    pub async fn purge_jobs_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let cutoff = to_db(&cutoff);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM jobs WHERE created_at < ?1 AND status IN ('completed', 'failed', 'cancelled')",
                    params![cutoff],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
