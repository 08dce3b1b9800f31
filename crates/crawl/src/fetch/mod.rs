//! Sequential, rate-limited page retrieval.
//!
//! ### Gates (checked before any request)
//! - URL is canonicalized and must not have been attempted in this run.
//! - The source's page budget (`max_pages`) must not be spent.
//!
//! ### Pacing
//! - Consecutive requests are at least `delay_between_requests` apart.
//! - The request timeout is fixed when the HTTP client is built.
//!
//! ### Transport
//! - [`PageSource`] abstracts the wire so the pipeline can run on canned pages.
//! - [`HttpSource`] is the reqwest implementation with redirect and size limits.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub use self::url::{UrlError, canonicalize, same_host};

use crate::context::JobRunContext;

/// Per-request failures. Only a failure on the root URL ends a job.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    #[error("ALREADY_VISITED: {0}")]
    AlreadyVisited(String),

    #[error("PAGE_BUDGET_EXHAUSTED: limit of {max_pages} pages reached")]
    BudgetExhausted { max_pages: u32 },

    #[error("FETCH_TIMEOUT: {0}")]
    Timeout(String),

    #[error("FETCH_TOO_LARGE: {0}")]
    TooLarge(String),

    #[error("HTTP_ERROR: status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("NETWORK_ERROR: {0}")]
    Network(String),
}

impl FetchError {
    /// Gate refusals are bookkeeping, not errors worth counting.
    pub fn is_gate(&self) -> bool {
        matches!(self, FetchError::AlreadyVisited(_) | FetchError::BudgetExhausted { .. })
    }
}

impl From<UrlError> for FetchError {
    fn from(err: UrlError) -> Self {
        FetchError::InvalidUrl(err.to_string())
    }
}

/// Raw response from a [`PageSource`].
#[derive(Debug, Clone)]
pub struct SourceResponse {
    /// The URL after redirects.
    pub final_url: ::url::Url,
    pub status: u16,
    pub body: String,
}

/// Something that can hand back the HTML behind a URL.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get(&self, url: &::url::Url) -> Result<SourceResponse, FetchError>;
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "gleaner/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 30s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "gleaner/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_secs(30),
            max_redirects: 5,
        }
    }
}

impl From<&gleaner_core::AppConfig> for FetchConfig {
    fn from(config: &gleaner_core::AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed [`PageSource`].
pub struct HttpSource {
    http: Client,
    config: FetchConfig,
}

impl HttpSource {
    /// Create a new HTTP source with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn check_size(&self, len: usize) -> Result<(), FetchError> {
        if len > self.config.max_bytes {
            return Err(FetchError::TooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }
        Ok(())
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(err.to_string())
    } else {
        FetchError::Network(err.to_string())
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn get(&self, url: &::url::Url) -> Result<SourceResponse, FetchError> {
        let response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16(), url: url.to_string() });
        }

        if let Some(len) = response.content_length() {
            self.check_size(len as usize)?;
        }

        let final_url = response.url().clone();
        let bytes: Bytes = response.bytes().await.map_err(classify)?;
        self.check_size(bytes.len())?;

        Ok(SourceResponse { final_url, status: status.as_u16(), body: String::from_utf8_lossy(&bytes).into_owned() })
    }
}

/// A page retrieved for extraction.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Canonical URL that was requested.
    pub url: ::url::Url,
    /// URL after redirects; relative links resolve against it.
    pub final_url: ::url::Url,
    pub status: u16,
    pub html: String,
    pub fetch_ms: u64,
}

/// Run-scoped fetcher enforcing the visited set, page budget and pacing.
pub struct PageFetcher {
    source: Arc<dyn PageSource>,
    delay: Duration,
    last_request: Option<Instant>,
}

impl PageFetcher {
    pub fn new(source: Arc<dyn PageSource>, delay: Duration) -> Self {
        Self { source, delay, last_request: None }
    }

    /// Fetch one page, honoring the context's gates.
    ///
    /// The caller records the attempt in the context whatever the result.
    pub async fn fetch(&mut self, ctx: &JobRunContext, url: &str) -> Result<FetchedPage, FetchError> {
        let url = canonicalize(url)?;

        if ctx.has_visited(url.as_str()) {
            return Err(FetchError::AlreadyVisited(url.to_string()));
        }
        if ctx.pages_remaining() == 0 {
            return Err(FetchError::BudgetExhausted { max_pages: ctx.source().max_pages });
        }

        self.pace().await;

        let start = Instant::now();
        let response = self.source.get(&url).await?;
        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            job_id = ctx.job_id(),
            url = %url,
            final_url = %response.final_url,
            fetch_ms,
            bytes = response.body.len(),
            "fetched page"
        );

        Ok(FetchedPage { url, final_url: response.final_url, status: response.status, html: response.body, fetch_ms })
    }

    async fn pace(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}
