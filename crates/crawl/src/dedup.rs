//! Exact-duplicate detection by content fingerprint.

use gleaner_core::{Error, Store, content_hash};

use crate::extract::ArticleCandidate;

/// Result of the fingerprint lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupVerdict {
    /// No stored record carries this hash yet.
    Fresh { hash: String },
    /// A record from some job already carries this hash.
    Duplicate { hash: String },
}

/// Checks candidates against every stored content hash.
///
/// The lookup is advisory; the unique index on `content.content_hash` settles
/// races between concurrent jobs at insert time.
#[derive(Debug, Clone)]
pub struct DedupGate {
    store: Store,
}

impl DedupGate {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn check(&self, candidate: &ArticleCandidate) -> Result<DedupVerdict, Error> {
        let hash = content_hash(&candidate.title, &candidate.content);
        if self.store.content_hash_exists(&hash).await? {
            tracing::debug!(hash = %hash, title = %candidate.title, "duplicate content");
            Ok(DedupVerdict::Duplicate { hash })
        } else {
            Ok(DedupVerdict::Fresh { hash })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ContentStore;
    use gleaner_core::models::NewSource;

    fn candidate(title: &str) -> ArticleCandidate {
        ArticleCandidate {
            title: title.into(),
            content: "body text".into(),
            author: None,
            published_date: None,
            source_url: "https://x.com/a".into(),
            raw_html: String::new(),
        }
    }

    #[tokio::test]
    async fn test_check_fresh_then_duplicate() {
        let store = Store::open_in_memory().await.unwrap();
        let source = store.insert_source(&NewSource::new("Blog", "https://x.com/")).await.unwrap();
        let job = store.create_job(source.id).await.unwrap();
        let gate = DedupGate::new(store.clone());

        let DedupVerdict::Fresh { hash } = gate.check(&candidate("Hello")).await.unwrap() else {
            panic!("first sighting must be fresh");
        };
        assert_eq!(hash, content_hash("Hello", "body text"));

        ContentStore::new(store.clone())
            .persist(&candidate("Hello"), &hash, None, job.id)
            .await
            .unwrap();

        assert_eq!(gate.check(&candidate("Hello")).await.unwrap(), DedupVerdict::Duplicate { hash });
        assert!(matches!(gate.check(&candidate("Other")).await.unwrap(), DedupVerdict::Fresh { .. }));
    }
}
