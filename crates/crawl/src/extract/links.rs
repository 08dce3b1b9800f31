//! Link harvesting for follow-up crawling.

use scraper::{ElementRef, Html};
use std::collections::HashSet;
use url::Url;

use gleaner_core::models::SourceConfig;

use crate::fetch::same_host;

/// `href` values of every `<a>` under `scope`, in document order.
pub(crate) fn hrefs<'a>(scope: ElementRef<'a>) -> impl Iterator<Item = &'a str> {
    scope
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a")
        .filter_map(|el| el.value().attr("href"))
}

/// Resolve an href against `base`, keeping only http(s) targets without fragment.
fn resolve(base: &Url, href: &str) -> Option<Url> {
    let mut url = base.join(href.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Extract links from a document, resolved against the base URL and deduplicated.
pub fn extract_links(doc: &Html, base_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    hrefs(doc.root_element())
        .filter_map(|href| resolve(base_url, href))
        .filter(|url| seen.insert(url.to_string()))
        .collect()
}

/// Links worth queueing: same host as the source root and not excluded.
pub fn follow_targets(links: &[Url], root: &Url, source: &SourceConfig) -> Vec<Url> {
    links
        .iter()
        .filter(|url| same_host(url, root))
        .filter(|url| !source.is_excluded(url.as_str()))
        .cloned()
        .collect()
}
