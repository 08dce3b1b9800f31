//! Article extraction from listing and post pages.
//!
//! ### Element discovery
//! - Containers come from the source's content selector, else from the
//!   fallback chain in [`ExtractRules`]; the first strategy with a match wins.
//! - Each container yields at most one [`ArticleCandidate`].
//!
//! ### Fields
//! - Title: source title selector, else the title fallback chain. No title, no candidate.
//! - Body: visible text with noise (scripts, navigation, comments...) removed
//!   and whitespace collapsed.
//! - Author and date are best-effort and may be absent.
//! - URL: the first `href` inside the container joined onto the page URL
//!   as written (scheme and fragment kept), else the page URL.
//!
//! ### Validity gate
//! - Non-empty title and body, body at least `min_content_chars` characters.
//! - URL must satisfy the source's include and exclude patterns.

pub mod links;
pub mod selectors;
pub mod text;

pub use links::{extract_links, follow_targets};
pub use selectors::SelectorChain;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use serde::Serialize;
use std::fmt;
use url::Url;

use gleaner_core::models::SourceConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("INVALID_SELECTOR: '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Fallback selectors and thresholds used when a source leaves them unset.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractRules {
    pub container_fallbacks: Vec<String>,
    pub title_fallbacks: Vec<String>,
    /// Elements whose text never counts as article body.
    pub noise: Vec<String>,
    pub min_content_chars: usize,
}

impl Default for ExtractRules {
    fn default() -> Self {
        let owned = |list: &[&str]| -> Vec<String> { list.iter().map(|s| s.to_string()).collect() };
        Self {
            container_fallbacks: owned(&["article", ".post", ".entry", ".content"]),
            title_fallbacks: owned(&["h1", "h2", "h3", ".title", ".post-title"]),
            noise: owned(&["script", "style", "nav", "footer", ".comments", ".sidebar"]),
            min_content_chars: 100,
        }
    }
}

/// Why an element did not become a stored article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    MissingTitle,
    EmptyTitle,
    EmptyContent,
    TooShort { chars: usize, min: usize },
    NotIncluded,
    Excluded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingTitle => f.write_str("no title element"),
            SkipReason::EmptyTitle => f.write_str("empty title"),
            SkipReason::EmptyContent => f.write_str("empty content"),
            SkipReason::TooShort { chars, min } => write!(f, "content too short ({chars} < {min} chars)"),
            SkipReason::NotIncluded => f.write_str("url matches no include pattern"),
            SkipReason::Excluded => f.write_str("url matches an exclude pattern"),
        }
    }
}

/// Candidate-level acceptance rules: a length floor plus the source's URL patterns.
#[derive(Debug, Clone)]
pub struct ValidityGate {
    min_content_chars: usize,
    source: SourceConfig,
}

impl ValidityGate {
    pub fn new(source: &SourceConfig, rules: &ExtractRules) -> Self {
        Self { min_content_chars: rules.min_content_chars, source: source.clone() }
    }
}

/// An article pulled out of a page, not yet checked for duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleCandidate {
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub source_url: String,
    pub raw_html: String,
}

impl ArticleCandidate {
    pub fn validate(&self, gate: &ValidityGate) -> Result<(), SkipReason> {
        if self.title.trim().is_empty() {
            return Err(SkipReason::EmptyTitle);
        }
        if self.content.trim().is_empty() {
            return Err(SkipReason::EmptyContent);
        }

        let chars = self.content.chars().count();
        if chars < gate.min_content_chars {
            return Err(SkipReason::TooShort { chars, min: gate.min_content_chars });
        }

        let url = self.source_url.as_str();
        if !gate.source.is_included(url) {
            return Err(SkipReason::NotIncluded);
        }
        if gate.source.is_excluded(url) {
            return Err(SkipReason::Excluded);
        }

        Ok(())
    }

    pub fn is_valid(&self, gate: &ValidityGate) -> bool {
        self.validate(gate).is_ok()
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// An element rejected during extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedElement {
    pub url: String,
    pub reason: SkipReason,
}

/// Everything pulled out of one page.
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    /// Candidates that passed the validity gate, in document order.
    pub candidates: Vec<ArticleCandidate>,
    pub skipped: Vec<SkippedElement>,
    /// Deduplicated http(s) links found anywhere on the page.
    pub links: Vec<Url>,
}

/// Selector-driven extractor built once per job from the source configuration.
#[derive(Debug, Clone)]
pub struct ArticleExtractor {
    containers: SelectorChain,
    titles: SelectorChain,
    body: Option<SelectorChain>,
    author: Option<SelectorChain>,
    date: Option<SelectorChain>,
    noise: SelectorChain,
    gate: ValidityGate,
}

fn configured(selector: &Option<String>) -> Option<&str> {
    selector.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn optional_chain(selector: &Option<String>) -> Result<Option<SelectorChain>, ExtractError> {
    configured(selector).map(SelectorChain::single).transpose()
}

impl ArticleExtractor {
    /// Compile every selector up front; a bad configured selector fails here.
    pub fn new(source: &SourceConfig, rules: &ExtractRules) -> Result<Self, ExtractError> {
        let selectors = &source.selectors;

        let containers = match configured(&selectors.content) {
            Some(sel) => SelectorChain::single(sel)?,
            None => SelectorChain::parse(&rules.container_fallbacks)?,
        };
        let titles = match configured(&selectors.title) {
            Some(sel) => SelectorChain::single(sel)?,
            None => SelectorChain::parse(&rules.title_fallbacks)?,
        };

        Ok(Self {
            containers,
            titles,
            body: optional_chain(&selectors.content)?,
            author: optional_chain(&selectors.author)?,
            date: optional_chain(&selectors.date)?,
            noise: SelectorChain::parse(&rules.noise)?,
            gate: ValidityGate::new(source, rules),
        })
    }

    pub fn extract(&self, html: &str, base_url: &Url) -> PageExtraction {
        let doc = Html::parse_document(html);
        let mut page = PageExtraction { links: extract_links(&doc, base_url), ..Default::default() };

        for element in self.containers.select_all(&doc) {
            let candidate = match self.candidate(element, base_url) {
                Ok(candidate) => candidate,
                Err(reason) => {
                    page.skipped.push(SkippedElement { url: base_url.to_string(), reason });
                    continue;
                }
            };

            match candidate.validate(&self.gate) {
                Ok(()) => page.candidates.push(candidate),
                Err(reason) => page.skipped.push(SkippedElement { url: candidate.source_url, reason }),
            }
        }

        tracing::debug!(
            url = %base_url,
            candidates = page.candidates.len(),
            skipped = page.skipped.len(),
            links = page.links.len(),
            "extracted page"
        );

        page
    }

    fn candidate(&self, element: ElementRef<'_>, base_url: &Url) -> Result<ArticleCandidate, SkipReason> {
        let title = self.titles.first(element).ok_or(SkipReason::MissingTitle)?;

        let scope = self.body.as_ref().and_then(|chain| chain.first(element)).unwrap_or(element);

        let author = self
            .author
            .as_ref()
            .and_then(|chain| chain.first(element))
            .map(text::element_text)
            .filter(|a| !a.is_empty());

        let published_date = self.date.as_ref().and_then(|chain| chain.first(element)).and_then(text::element_date);

        let source_url = links::hrefs(element)
            .next()
            .and_then(|href| base_url.join(href.trim()).ok())
            .unwrap_or_else(|| base_url.clone());

        Ok(ArticleCandidate {
            title: text::element_text(title),
            content: text::visible_text(scope, &self.noise),
            author,
            published_date,
            source_url: source_url.to_string(),
            raw_html: element.html(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::make_source;

    const BODY: &str = "Rust ownership makes memory safety a compile-time property. \
        This paragraph is long enough to pass the minimum content length check.";

    fn base() -> Url {
        Url::parse("https://x.com/").unwrap()
    }

    fn extractor(source: &SourceConfig) -> ArticleExtractor {
        ArticleExtractor::new(source, &ExtractRules::default()).unwrap()
    }

    fn candidate(title: &str, content: &str, url: &str) -> ArticleCandidate {
        ArticleCandidate {
            title: title.into(),
            content: content.into(),
            author: None,
            published_date: None,
            source_url: url.into(),
            raw_html: String::new(),
        }
    }

    #[test]
    fn test_extract_two_articles_with_fallbacks() {
        let html = format!(
            r#"<html><body>
                <article><h2><a href="/post-1">First</a></h2><p>{BODY}</p></article>
                <article><h2><a href="/post-2">Second</a></h2><p>{BODY}</p><div class="comments">Spam</div></article>
            </body></html>"#
        );
        let page = extractor(&make_source(1)).extract(&html, &base());

        assert_eq!(page.candidates.len(), 2);
        assert_eq!(page.candidates[0].title, "First");
        assert_eq!(page.candidates[0].source_url, "https://x.com/post-1");
        assert_eq!(page.candidates[1].source_url, "https://x.com/post-2");
        assert!(!page.candidates[1].content.contains("Spam"));
        assert!(page.candidates[1].raw_html.starts_with("<article>"));
        assert!(page.skipped.is_empty());
        assert_eq!(page.links.len(), 2);
    }

    #[test]
    fn test_extract_container_fallback_order() {
        let html = format!(r#"<div class="entry"><h1>Entry</h1><p>{BODY}</p></div>"#);
        let page = extractor(&make_source(1)).extract(&html, &base());
        assert_eq!(page.candidates.len(), 1);
        assert_eq!(page.candidates[0].title, "Entry");
        assert_eq!(page.candidates[0].source_url, "https://x.com/");
    }

    #[test]
    fn test_extract_url_is_first_href_as_written() {
        let html = format!(
            r##"<html><body>
                <article><h2>Anchored</h2><a href="#comments">3 comments</a><a href="/post-1">Read</a><p>{BODY}</p></article>
                <article><h2>Mailed</h2><a href="mailto:editor@x.com">Write in</a><p>{BODY}</p></article>
            </body></html>"##
        );
        let page = extractor(&make_source(1)).extract(&html, &base());

        assert_eq!(page.candidates.len(), 2);
        assert_eq!(page.candidates[0].source_url, "https://x.com/#comments");
        assert_eq!(page.candidates[1].source_url, "mailto:editor@x.com");
        assert!(page.links.iter().all(|l| l.scheme() == "https" && l.fragment().is_none()));
    }

    #[test]
    fn test_extract_missing_title_is_skipped() {
        let html = format!("<article><p>{BODY}</p></article>");
        let page = extractor(&make_source(1)).extract(&html, &base());
        assert!(page.candidates.is_empty());
        assert_eq!(page.skipped[0].reason, SkipReason::MissingTitle);
    }

    #[test]
    fn test_extract_short_content_is_skipped() {
        let page = extractor(&make_source(1)).extract("<article><h1>T</h1><p>Too short.</p></article>", &base());
        assert!(page.candidates.is_empty());
        assert!(matches!(page.skipped[0].reason, SkipReason::TooShort { min: 100, .. }));
    }

    #[test]
    fn test_extract_configured_selectors() {
        let mut source = make_source(1);
        source.selectors.content = Some(".body".into());
        source.selectors.title = Some(".headline".into());
        source.selectors.author = Some(".byline".into());
        source.selectors.date = Some("time".into());

        let html = format!(
            r#"<div class="card">
                <span class="headline">Configured</span>
                <span class="byline">  Jane   Doe </span>
                <time datetime="2024-02-01T09:00:00Z">Feb 1</time>
                <div class="body"><p>{BODY}</p><nav>Next</nav></div>
            </div>"#
        );
        let page = extractor(&source).extract(&html, &base());

        assert!(page.candidates.is_empty(), "container is the content selector itself");

        let html = format!(r#"<div class="body"><span class="headline">Configured</span><p>{BODY}</p></div>"#);
        let page = extractor(&source).extract(&html, &base());
        assert_eq!(page.candidates.len(), 1);
        assert_eq!(page.candidates[0].title, "Configured");
    }

    #[test]
    fn test_extract_author_and_date() {
        let mut source = make_source(1);
        source.selectors.author = Some(".byline".into());
        source.selectors.date = Some("time".into());

        let html = format!(
            r#"<article>
                <h1>Dated</h1>
                <span class="byline">  Jane   Doe </span>
                <time datetime="2024-02-01T09:00:00Z">Feb 1</time>
                <p>{BODY}</p>
            </article>"#
        );
        let page = extractor(&source).extract(&html, &base());
        let c = &page.candidates[0];
        assert_eq!(c.author.as_deref(), Some("Jane Doe"));
        assert_eq!(c.published_date.map(|d| d.to_rfc3339()), Some("2024-02-01T09:00:00+00:00".to_string()));
    }

    #[test]
    fn test_extract_absent_optional_fields() {
        let mut source = make_source(1);
        source.selectors.author = Some(".byline".into());
        let html = format!("<article><h1>T</h1><p>{BODY}</p></article>");
        let c = &extractor(&source).extract(&html, &base()).candidates[0];
        assert!(c.author.is_none());
        assert!(c.published_date.is_none());
    }

    #[test]
    fn test_invalid_configured_selector() {
        let mut source = make_source(1);
        source.selectors.title = Some("h1[[".into());
        let result = ArticleExtractor::new(&source, &ExtractRules::default());
        assert!(matches!(result, Err(ExtractError::InvalidSelector { .. })));
    }

    #[test]
    fn test_validate_content_length() {
        let gate = ValidityGate::new(&make_source(1), &ExtractRules::default());
        let short = candidate("T", &"a".repeat(99), "https://x.com/p");
        assert_eq!(short.validate(&gate), Err(SkipReason::TooShort { chars: 99, min: 100 }));
        assert!(!short.is_valid(&gate));
        assert!(candidate("T", &"a".repeat(100), "https://x.com/p").is_valid(&gate));
    }

    #[test]
    fn test_validate_counts_characters_not_bytes() {
        let gate = ValidityGate::new(&make_source(1), &ExtractRules::default());
        let accented = candidate("T", &"é".repeat(60), "https://x.com/p");
        assert!(matches!(accented.validate(&gate), Err(SkipReason::TooShort { chars: 60, .. })));
    }

    #[test]
    fn test_validate_empty_fields() {
        let gate = ValidityGate::new(&make_source(1), &ExtractRules::default());
        assert_eq!(candidate("  ", BODY, "https://x.com/p").validate(&gate), Err(SkipReason::EmptyTitle));
        assert_eq!(candidate("T", "", "https://x.com/p").validate(&gate), Err(SkipReason::EmptyContent));
    }

    #[test]
    fn test_validate_url_patterns() {
        let mut source = make_source(1);
        source.include_patterns = vec!["/blog/".into()];
        source.exclude_patterns = vec!["/blog/drafts/".into()];
        let gate = ValidityGate::new(&source, &ExtractRules::default());

        assert_eq!(candidate("T", BODY, "https://x.com/about").validate(&gate), Err(SkipReason::NotIncluded));
        assert!(candidate("T", BODY, "https://x.com/blog/post-1").is_valid(&gate));
        assert_eq!(candidate("T", BODY, "https://x.com/blog/drafts/wip").validate(&gate), Err(SkipReason::Excluded));
    }

    #[test]
    fn test_word_count() {
        assert_eq!(candidate("T", "one two  three", "u").word_count(), 3);
    }

    #[test]
    fn test_skip_reason_serializes_tagged() {
        let json = serde_json::to_value(SkipReason::TooShort { chars: 3, min: 100 }).unwrap();
        assert_eq!(json["reason"], "too_short");
        assert_eq!(json["chars"], 3);
    }
}
