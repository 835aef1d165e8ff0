pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod fuzzy;
pub mod index;
pub mod orchestrator;
pub mod scorer;
pub mod store;
pub mod tokenizer;
pub mod worker;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

pub use config::{ExecutionMode, SearchConfig};
pub use error::{ConfigError, SearchError, StoreError};
pub use filter::SearchFilters;
pub use index::{IndexOutcome, InvertedIndex, RebuildStats};
pub use orchestrator::{SearchEngine, SearchResponse};
pub use store::{DocumentStore, MemoryStore, SledStore};

pub type DocId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Recipe,
    Survival,
    Medical,
    Repair,
    Navigation,
    Contact,
    Idea,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::General,
        Category::Recipe,
        Category::Survival,
        Category::Medical,
        Category::Repair,
        Category::Navigation,
        Category::Contact,
        Category::Idea,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Recipe => "recipe",
            Category::Survival => "survival",
            Category::Medical => "medical",
            Category::Repair => "repair",
            Category::Navigation => "navigation",
            Category::Contact => "contact",
            Category::Idea => "idea",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    /// Opaque handle understood by the media collaborator (blob key, file name).
    pub reference: String,
}

/// A captured note as handed over by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: DocId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub media: Vec<MediaRef>,
}

impl Document {
    pub fn new(id: impl Into<DocId>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            category: None,
            language: String::new(),
            tags: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
            location: None,
            media: Vec::new(),
        }
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn created(mut self, at: OffsetDateTime) -> Self {
        self.created_at = at;
        self
    }

    /// Title, content and tags joined by spaces and lowercased.
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(self.title.len() + self.content.len() + 16);
        text.push_str(&self.title);
        text.push(' ');
        text.push_str(&self.content);
        text.push(' ');
        text.push_str(&self.tags.join(" "));
        text.to_lowercase()
    }

    /// A document without a usable identifier cannot be indexed.
    pub fn has_valid_id(&self) -> bool { !self.id.trim().is_empty() }

    pub fn has_media(&self) -> bool { !self.media.is_empty() }

    pub fn has_location(&self) -> bool { self.location.is_some() }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: Document,
    pub score: f64,
    pub matched_terms: Option<Vec<String>>,
}
