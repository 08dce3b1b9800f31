//! Visible-text cleanup and best-effort date parsing.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use scraper::ElementRef;

use super::selectors::SelectorChain;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y", "%m/%d/%Y"];

/// Collapse every whitespace run to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of an element with whitespace collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Text of `scope`, skipping everything under nodes matched by `noise`.
pub fn visible_text(scope: ElementRef<'_>, noise: &SelectorChain) -> String {
    let noise_ids: HashSet<_> = noise.all_within(scope).into_iter().map(|e| e.id()).collect();

    let mut raw = String::new();
    for node in scope.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if node.ancestors().any(|a| noise_ids.contains(&a.id())) {
            continue;
        }
        raw.push_str(text);
    }

    collapse_whitespace(&raw)
}

/// Date carried by an element: `datetime`/`content` attribute first, then text.
pub fn element_date(element: ElementRef<'_>) -> Option<DateTime<Utc>> {
    let attrs = ["datetime", "content"];
    attrs
        .iter()
        .filter_map(|a| element.value().attr(a))
        .find_map(parse_date)
        .or_else(|| parse_date(&element_text(element)))
}

/// Parse the date formats commonly seen on blogs. Unrecognised input yields `None`.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .map(|dt| dt.and_utc())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}
