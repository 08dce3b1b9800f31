//! Persistence of accepted candidates as pending review records.

use gleaner_core::models::{ContentRecord, NewContent};
use gleaner_core::{Error, Store};
use serde_json::{Map, Value};

use crate::context::CandidateOutcome;
use crate::extract::ArticleCandidate;

const EXTRACTION_METHOD: &str = "automated";

/// Writes candidates to the content table.
#[derive(Debug, Clone)]
pub struct ContentStore {
    store: Store,
}

impl ContentStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Insert a pending record for a candidate that passed the dedup gate.
    pub async fn persist(
        &self, candidate: &ArticleCandidate, hash: &str, similarity: Option<f64>, job_id: i64,
    ) -> Result<ContentRecord, Error> {
        let mut metadata = Map::new();
        metadata.insert("word_count".into(), Value::from(candidate.word_count()));
        metadata.insert("extraction_method".into(), Value::from(EXTRACTION_METHOD));

        let new = NewContent {
            job_id,
            source_url: candidate.source_url.clone(),
            title: candidate.title.clone(),
            content: candidate.content.clone(),
            author: candidate.author.clone(),
            published_date: candidate.published_date,
            content_hash: hash.to_string(),
            similarity_score: similarity,
            raw_html: candidate.raw_html.clone(),
            extracted_metadata: metadata,
        };
        self.store.insert_content(&new).await
    }

    /// Persist and classify the result.
    ///
    /// A uniqueness violation means another job stored the same text first,
    /// so it is reported as a duplicate rather than a failure.
    pub async fn ingest(&self, candidate: &ArticleCandidate, hash: &str, similarity: f64, job_id: i64) -> CandidateOutcome {
        match self.persist(candidate, hash, Some(similarity), job_id).await {
            Ok(record) => CandidateOutcome::Accepted { content_id: record.id, title: record.title, similarity },
            Err(e) if e.is_duplicate() => {
                CandidateOutcome::Duplicate { title: candidate.title.clone(), hash: hash.to_string() }
            }
            Err(e) => {
                tracing::warn!(job_id, title = %candidate.title, error = %e, "failed to store content");
                CandidateOutcome::Failed { title: candidate.title.clone(), error: e.to_string() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleaner_core::content_hash;
    use gleaner_core::models::{NewSource, ReviewStatus};

    fn candidate() -> ArticleCandidate {
        ArticleCandidate {
            title: "Ownership".into(),
            content: "Rust tracks ownership at compile time".into(),
            author: Some("Jane".into()),
            published_date: None,
            source_url: "https://x.com/ownership".into(),
            raw_html: "<article>...</article>".into(),
        }
    }

    async fn setup() -> (Store, i64) {
        let store = Store::open_in_memory().await.unwrap();
        let source = store.insert_source(&NewSource::new("Blog", "https://x.com/")).await.unwrap();
        let job = store.create_job(source.id).await.unwrap();
        (store, job.id)
    }

    #[tokio::test]
    async fn test_persist_pending_with_metadata() {
        let (store, job_id) = setup().await;
        let c = candidate();
        let hash = content_hash(&c.title, &c.content);

        let record = ContentStore::new(store).persist(&c, &hash, Some(0.25), job_id).await.unwrap();
        assert_eq!(record.status, ReviewStatus::Pending);
        assert_eq!(record.job_id, Some(job_id));
        assert_eq!(record.similarity_score, Some(0.25));
        assert_eq!(record.author.as_deref(), Some("Jane"));
        assert_eq!(record.extracted_metadata["word_count"], 6);
        assert_eq!(record.extracted_metadata["extraction_method"], "automated");
    }

    #[tokio::test]
    async fn test_ingest_reclassifies_unique_violation() {
        let (store, job_id) = setup().await;
        let c = candidate();
        let hash = content_hash(&c.title, &c.content);
        let ingest = ContentStore::new(store.clone());

        let first = ingest.ingest(&c, &hash, 0.0, job_id).await;
        assert!(matches!(first, CandidateOutcome::Accepted { .. }));

        let second = ingest.ingest(&c, &hash, 0.0, job_id).await;
        assert_eq!(second, CandidateOutcome::Duplicate { title: c.title.clone(), hash: hash.clone() });
        assert_eq!(store.list_content_for_job(job_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_failure_is_not_fatal() {
        let (store, _) = setup().await;
        let c = candidate();
        let outcome = ContentStore::new(store).ingest(&c, "hash", 0.0, 9999).await;
        assert!(matches!(outcome, CandidateOutcome::Failed { .. }));
    }
}
