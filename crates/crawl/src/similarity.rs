//! TF-IDF similarity against the recently published corpus.
//!
//! ### Corpus
//! - The most recently published bodies (published_at desc, id desc), loaded
//!   once per job.
//!
//! ### Vectorization
//! - Lowercased tokens of two or more word characters, English stop words removed.
//! - Vocabulary: the `max_features` most frequent terms over corpus and
//!   candidate together, ties broken alphabetically.
//! - Smoothed idf `ln((1 + n) / (1 + df)) + 1`, rows L2-normalised.
//!
//! The score is the best cosine match, clamped to `[0, 1]`. It annotates a
//! record and never blocks persistence.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use gleaner_core::{AppConfig, Error, Store};
use regex::Regex;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("static token pattern"));

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost", "alone", "along",
    "already", "also", "although", "always", "am", "among", "amongst", "amoungst", "amount", "an", "and", "another",
    "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became",
    "because", "become", "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can", "cannot", "cant", "co", "con",
    "could", "couldnt", "cry", "de", "describe", "detail", "do", "done", "down", "due", "during", "each", "eg", "eight",
    "either", "eleven", "else", "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five", "for", "former",
    "formerly", "forty", "found", "four", "from", "front", "full", "further", "get", "give", "go", "had", "has", "hasnt",
    "have", "he", "hence", "her", "here", "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him",
    "himself", "his", "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into", "is",
    "it", "its", "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd", "made", "many", "may", "me",
    "meanwhile", "might", "mill", "mine", "more", "moreover", "most", "mostly", "move", "much", "must", "my", "myself",
    "name", "namely", "neither", "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or", "other", "others",
    "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part", "per", "perhaps", "please", "put", "rather",
    "re", "same", "see", "seem", "seemed", "seeming", "seems", "serious", "several", "she", "should", "show", "side",
    "since", "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something", "sometime", "sometimes",
    "somewhere", "still", "such", "system", "take", "ten", "than", "that", "the", "their", "them", "themselves", "then",
    "thence", "there", "thereafter", "thereby", "therefore", "therein", "thereupon", "these", "they", "thick", "thin",
    "third", "this", "those", "though", "three", "through", "throughout", "thru", "thus", "to", "together", "too", "top",
    "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up", "upon", "us", "very", "via", "was",
    "we", "well", "were", "what", "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas", "whereby",
    "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who", "whoever", "whole", "whom",
    "whose", "why", "will", "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Lowercased, stop-word-free tokens of a text.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Scores candidates against a snapshot of the published corpus.
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    corpus: Vec<String>,
    max_features: usize,
}

impl SimilarityScorer {
    pub fn new(corpus: Vec<String>, max_features: usize) -> Self {
        Self { corpus, max_features }
    }

    /// Snapshot the most recent published bodies from the store.
    pub async fn load(store: &Store, config: &AppConfig) -> Result<Self, Error> {
        let corpus = store.recent_published_contents(config.similarity_sample_size).await?;
        tracing::debug!(corpus = corpus.len(), max_features = config.max_features, "loaded similarity corpus");
        Ok(Self::new(corpus, config.max_features))
    }

    pub fn corpus_len(&self) -> usize {
        self.corpus.len()
    }

    /// Highest cosine similarity between `text` and any corpus document.
    pub fn score(&self, text: &str) -> f64 {
        if self.corpus.is_empty() || self.max_features == 0 {
            return 0.0;
        }

        let mut docs: Vec<Vec<String>> = self.corpus.iter().map(|d| tokenize(d)).collect();
        docs.push(tokenize(text));

        let vocabulary = vocabulary(&docs, self.max_features);
        if vocabulary.is_empty() {
            return 0.0;
        }

        let idf = inverse_document_frequency(&docs, &vocabulary);
        let vectors: Vec<Vec<f64>> = docs.iter().map(|d| weigh(d, &vocabulary, &idf)).collect();

        let Some((candidate, corpus)) = vectors.split_last() else {
            return 0.0;
        };

        corpus
            .iter()
            .map(|row| dot(candidate, row))
            .fold(0.0_f64, f64::max)
            .clamp(0.0, 1.0)
    }
}

/// Term to column index for the `max_features` most frequent terms.
fn vocabulary(docs: &[Vec<String>], max_features: usize) -> HashMap<String, usize> {
    let mut frequency: BTreeMap<&str, usize> = BTreeMap::new();
    for token in docs.iter().flatten() {
        *frequency.entry(token.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(&str, usize)> = frequency.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(max_features);
    ranked.sort_by(|a, b| a.0.cmp(b.0));

    ranked.into_iter().enumerate().map(|(i, (term, _))| (term.to_string(), i)).collect()
}

fn inverse_document_frequency(docs: &[Vec<String>], vocabulary: &HashMap<String, usize>) -> Vec<f64> {
    let mut df = vec![0usize; vocabulary.len()];
    for doc in docs {
        let seen: HashSet<usize> = doc.iter().filter_map(|t| vocabulary.get(t).copied()).collect();
        for column in seen {
            df[column] += 1;
        }
    }

    let n = docs.len() as f64;
    df.into_iter().map(|d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0).collect()
}

/// L2-normalised tf-idf row for one document.
fn weigh(doc: &[String], vocabulary: &HashMap<String, usize>, idf: &[f64]) -> Vec<f64> {
    let mut row = vec![0.0; vocabulary.len()];
    for token in doc {
        if let Some(&column) = vocabulary.get(token) {
            row[column] += 1.0;
        }
    }
    for (weight, idf) in row.iter_mut().zip(idf) {
        *weight *= idf;
    }

    let norm = row.iter().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for weight in &mut row {
            *weight /= norm;
        }
    }
    row
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleaner_core::models::NewPublishedItem;

    const RUST: &str = "Rust ownership rules guarantee memory safety without a garbage collector.";
    const BREAD: &str = "Sourdough bread needs a lively starter, flour, water and patience.";

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("The Borrow-Checker is a FRIEND, x y"), vec!["borrow", "checker", "friend"]);
    }

    #[test]
    fn test_empty_corpus_scores_zero() {
        let scorer = SimilarityScorer::new(Vec::new(), 1000);
        assert_eq!(scorer.score(RUST), 0.0);
    }

    #[test]
    fn test_identical_text_scores_one() {
        let scorer = SimilarityScorer::new(vec![BREAD.into(), RUST.into()], 1000);
        assert!((scorer.score(RUST) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unrelated_text_scores_low() {
        let scorer = SimilarityScorer::new(vec![BREAD.into()], 1000);
        assert_eq!(scorer.score(RUST), 0.0);
    }

    #[test]
    fn test_partial_overlap_between_bounds() {
        let scorer = SimilarityScorer::new(vec![RUST.into()], 1000);
        let score = scorer.score("Rust ownership makes concurrency fearless.");
        assert!(score > 0.0 && score < 1.0, "score was {score}");
    }

    #[test]
    fn test_stop_words_only_scores_zero() {
        let scorer = SimilarityScorer::new(vec!["the and of".into()], 1000);
        assert_eq!(scorer.score("it is a"), 0.0);
    }

    #[test]
    fn test_vocabulary_bounded_by_frequency_then_alphabet() {
        let docs = vec![tokenize("zeta zeta alpha beta"), tokenize("gamma beta")];
        let vocab = vocabulary(&docs, 2);
        assert_eq!(vocab.len(), 2);
        assert!(vocab.contains_key("beta"));
        assert!(vocab.contains_key("zeta"));
    }

    #[tokio::test]
    async fn test_load_uses_recent_published() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .insert_published(&NewPublishedItem {
                title: "Ownership".into(),
                content: RUST.into(),
                status: Default::default(),
                published_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let scorer = SimilarityScorer::load(&store, &AppConfig::default()).await.unwrap();
        assert_eq!(scorer.corpus_len(), 1);
        assert!(scorer.score(RUST) > 0.99);
    }
}
