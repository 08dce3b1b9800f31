//! SQLite-backed persistence for sources, jobs, crawled content and the
//! published corpus.
//!
//! Access goes through tokio-rusqlite, which runs every statement on a
//! dedicated background thread. The store provides:
//!
//! - Versioned schema migrations
//! - WAL mode so concurrent jobs can share one database file
//! - Guarded status updates that keep job transitions one-directional
//! - A UNIQUE index on content hashes as the dedup backstop

pub mod connection;
pub mod content;
pub mod hash;
pub mod jobs;
pub mod migrations;
pub mod published;
pub mod sources;

pub use crate::Error;

pub use connection::Store;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::rusqlite;

/// Format a timestamp for storage. Fixed precision keeps lexical order equal to time order.
pub(crate) fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

/// Read a non-null timestamp column.
pub(crate) fn ts_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw, idx)
}

/// Read a nullable timestamp column.
pub(crate) fn opt_ts_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_ts(&r, idx)).transpose()
}

/// Read a column holding a `FromStr` enum stored as text.
pub(crate) fn enum_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = Error>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: Error| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

/// Read a JSON text column.
pub(crate) fn json_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}
