use thiserror::Error;

/// Rejected configuration changes. The previous value stays in effect.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("fuzzy threshold {0} is outside 0.0..=1.0")]
    ThresholdOutOfRange(f64),

    #[error("max results {0} is outside 1..=1000")]
    MaxResultsOutOfRange(usize),
}

/// Failures reported by a storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("could not decode stored document '{id}': {source}")]
    Codec {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("document titled '{title}' has no id")]
    MissingId { title: String },
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self { StoreError::Backend(err.to_string()) }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("could not load documents: {0}")]
    Storage(#[from] StoreError),

    /// A newer query was submitted before this one ran.
    #[error("search superseded by a newer request")]
    Superseded,

    #[error("search worker did not answer within {0} ms")]
    WorkerTimeout(u64),

    #[error("search worker failed: {0}")]
    Worker(String),
}
