use crate::{Category, Document};
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

/// Optional metadata constraints, combined with AND. Absent fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub category: Option<Category>,
    pub language: Option<String>,
    /// Inclusive, from the start of the day (UTC).
    pub date_from: Option<Date>,
    /// Inclusive, through the end of the day (UTC).
    pub date_to: Option<Date>,
    /// A document passes when it carries any one of these tags.
    pub tags: Vec<String>,
    pub has_media: Option<bool>,
    pub has_location: Option<bool>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool { *self == SearchFilters::default() }

    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(category) = self.category {
            if doc.category != Some(category) {
                return false;
            }
        }
        if let Some(language) = self.language.as_deref() {
            if doc.language != language {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if doc.created_at < start_of_day(from) {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if !before_end_of_day(doc.created_at, to) {
                return false;
            }
        }
        if !self.tags.is_empty() {
            let any = self
                .tags
                .iter()
                .any(|wanted| doc.tags.iter().any(|t| t.eq_ignore_ascii_case(wanted)));
            if !any {
                return false;
            }
        }
        if let Some(want) = self.has_media {
            if doc.has_media() != want {
                return false;
            }
        }
        if let Some(want) = self.has_location {
            if doc.has_location() != want {
                return false;
            }
        }
        true
    }

    /// Documents passing every filter, input order preserved.
    pub fn apply<'a>(&self, docs: &'a [Document]) -> Vec<&'a Document> {
        docs.iter().filter(|d| self.matches(d)).collect()
    }
}

fn start_of_day(date: Date) -> OffsetDateTime { date.midnight().assume_utc() }

fn before_end_of_day(at: OffsetDateTime, date: Date) -> bool {
    match date.next_day() {
        Some(next) => at < start_of_day(next),
        None => true,
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<Date, String> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("invalid date '{s}': {e}"))
}
