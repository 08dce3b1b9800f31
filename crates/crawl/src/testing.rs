//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use gleaner_core::models::{CrawlStats, Schedule, Selectors, SourceConfig};

use crate::context::JobRunContext;
use crate::fetch::{FetchError, PageSource, SourceResponse};

pub(crate) fn make_source(max_pages: u32) -> SourceConfig {
    SourceConfig {
        id: 1,
        name: "Example".into(),
        url: "https://x.com/".into(),
        description: String::new(),
        schedule: Schedule::Manual,
        is_active: true,
        selectors: Selectors::default(),
        max_pages,
        delay_between_requests: 0.0,
        follow_links: false,
        include_patterns: Vec::new(),
        exclude_patterns: Vec::new(),
        stats: CrawlStats::default(),
        last_crawled_at: None,
        created_at: Utc::now(),
    }
}

pub(crate) fn make_context(max_pages: u32) -> JobRunContext {
    JobRunContext::new(7, Arc::new(make_source(max_pages)))
}

/// In-memory page source keyed by canonical URL.
#[derive(Default)]
pub(crate) struct StaticSource {
    pages: HashMap<String, Result<String, FetchError>>,
    requests: AtomicUsize,
}

impl StaticSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(html.to_string()));
        self
    }

    pub(crate) fn failing(mut self, url: &str, error: FetchError) -> Self {
        self.pages.insert(url.to_string(), Err(error));
        self
    }

    pub(crate) fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for StaticSource {
    async fn get(&self, url: &url::Url) -> Result<SourceResponse, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url.as_str()) {
            Some(Ok(body)) => Ok(SourceResponse { final_url: url.clone(), status: 200, body: body.clone() }),
            Some(Err(e)) => Err(e.clone()),
            None => Err(FetchError::Status { status: 404, url: url.to_string() }),
        }
    }
}
