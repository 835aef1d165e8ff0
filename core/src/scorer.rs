use crate::Document;
use time::{Duration, OffsetDateTime};

pub const TITLE_SUBSTRING: f64 = 10.0;
pub const TAG_SUBSTRING: f64 = 8.0;
pub const CONTENT_SUBSTRING: f64 = 5.0;
pub const TITLE_PREFIX: f64 = 7.0;
pub const CONTENT_PREFIX: f64 = 3.0;
pub const TITLE_EXACT: f64 = 15.0;
pub const TAG_EXACT: f64 = 12.0;

/// Bonus for fresh notes, added once per document.
pub fn recency_bonus(created_at: OffsetDateTime, now: OffsetDateTime) -> f64 {
    let age = now - created_at;
    if age < Duration::days(1) {
        3.0
    } else if age < Duration::days(7) {
        2.0
    } else if age < Duration::days(30) {
        1.0
    } else {
        0.0
    }
}

/// Additive relevance of `doc` for already-tokenized (lowercase) query terms.
pub fn score(doc: &Document, terms: &[String], now: OffsetDateTime) -> f64 {
    let title = doc.title.to_lowercase();
    let content = doc.content.to_lowercase();
    let tags: Vec<String> = doc.tags.iter().map(|t| t.to_lowercase()).collect();

    let mut total = 0.0;
    for term in terms {
        let term = term.as_str();
        if title.contains(term) {
            total += TITLE_SUBSTRING;
        }
        if tags.iter().any(|t| t.contains(term)) {
            total += TAG_SUBSTRING;
        }
        if content.contains(term) {
            total += CONTENT_SUBSTRING;
        }
        if title.split_whitespace().any(|w| w.starts_with(term)) {
            total += TITLE_PREFIX;
        }
        if content.split_whitespace().any(|w| w.starts_with(term)) {
            total += CONTENT_PREFIX;
        }
        if title == term {
            total += TITLE_EXACT;
        }
        if tags.iter().any(|t| t == term) {
            total += TAG_EXACT;
        }
    }
    total + recency_bonus(doc.created_at, now)
}
