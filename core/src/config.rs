use crate::error::ConfigError;
use crate::fuzzy::DEFAULT_FUZZY_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::str::FromStr;

pub const DEFAULT_MAX_RESULTS: usize = 100;
pub const MAX_RESULTS_RANGE: RangeInclusive<usize> = 1..=1000;
pub const THRESHOLD_RANGE: RangeInclusive<f64> = 0.0..=1.0;

/// Where the search algorithm runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// On the caller's thread.
    #[default]
    Sync,
    /// Always on the background worker.
    Worker,
    /// Worker once the corpus reaches `worker_min_documents`.
    Auto,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sync" => Ok(ExecutionMode::Sync),
            "worker" => Ok(ExecutionMode::Worker),
            "auto" => Ok(ExecutionMode::Auto),
            other => Err(format!("unknown execution mode '{other}', expected sync, worker or auto")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub fuzzy_threshold: f64,
    pub max_results: usize,
    /// Queries with fewer non-whitespace chars skip scoring and return the filtered set.
    pub min_query_length: usize,
    pub include_matched_terms: bool,
    pub execution: ExecutionMode,
    pub worker_min_documents: usize,
    pub worker_timeout_ms: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            max_results: DEFAULT_MAX_RESULTS,
            min_query_length: 1,
            include_matched_terms: true,
            execution: ExecutionMode::Sync,
            worker_min_documents: 500,
            worker_timeout_ms: Some(10_000),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_threshold(self.fuzzy_threshold)?;
        check_max_results(self.max_results)?;
        Ok(())
    }

    pub fn set_fuzzy_threshold(&mut self, threshold: f64) -> Result<(), ConfigError> {
        check_threshold(threshold)?;
        self.fuzzy_threshold = threshold;
        Ok(())
    }

    pub fn set_max_results(&mut self, max_results: usize) -> Result<(), ConfigError> {
        check_max_results(max_results)?;
        self.max_results = max_results;
        Ok(())
    }
}

fn check_threshold(threshold: f64) -> Result<(), ConfigError> {
    // NaN fails the range check too
    if THRESHOLD_RANGE.contains(&threshold) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange(threshold))
    }
}

fn check_max_results(max_results: usize) -> Result<(), ConfigError> {
    if MAX_RESULTS_RANGE.contains(&max_results) {
        Ok(())
    } else {
        Err(ConfigError::MaxResultsOutOfRange(max_results))
    }
}
