//! Content fingerprinting for exact-duplicate detection.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of `title ++ content`.
///
/// No separator is inserted, so the fingerprint depends only on the
/// concatenated text.
pub fn content_hash(title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
