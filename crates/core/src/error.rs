//! Unified error types for gleaner.
//!
//! Display strings carry a stable code prefix so log consumers can group
//! failures without parsing free-form messages.

use tokio_rusqlite::rusqlite;

/// Unified error type for the persistence and domain layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty source name).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A referenced row does not exist.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Insert rejected by the content hash uniqueness constraint.
    #[error("DUPLICATE_CONTENT: {0}")]
    DuplicateContent(String),

    /// A status change that the lifecycle does not allow.
    #[error("INVALID_TRANSITION: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Database operation failed.
    #[error("DB_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("DB_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A JSON column could not be encoded or decoded.
    #[error("SERIALIZATION_ERROR: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl Error {
    /// Whether this error is the content hash uniqueness backstop firing.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::DuplicateContent(_))
    }
}
