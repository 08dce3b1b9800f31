//! Fatal job failures.
//!
//! Anything that ends a job as `failed` surfaces as a [`JobError`]; per-page
//! and per-candidate problems are counted in the job instead.

use crate::extract::ExtractError;
use crate::fetch::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The source's root URL could not be fetched.
    #[error("ROOT_FETCH_FAILED: {url}: {source}")]
    RootFetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// The source carries a selector that does not compile.
    #[error("EXTRACT_ERROR: {0}")]
    Extract(#[from] ExtractError),

    /// The store could not record job progress.
    #[error("{0}")]
    Store(#[from] gleaner_core::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_codes() {
        let err = JobError::RootFetch { url: "https://x.com/".into(), source: FetchError::Network("refused".into()) };
        assert!(err.to_string().starts_with("ROOT_FETCH_FAILED: https://x.com/"));
        assert!(err.to_string().contains("NETWORK_ERROR"));

        let err = JobError::from(gleaner_core::Error::NotFound("job 1".into()));
        assert_eq!(err.to_string(), "NOT_FOUND: job 1");
    }
}
