//! The search algorithm proper.
//!
//! Both execution contexts call [`execute`]: the orchestrator directly on the caller's
//! thread, and the background worker after decoding a request. Nothing here touches the
//! index, the store or the clock, so the same inputs always give the same ranking.

use crate::config::SearchConfig;
use crate::filter::SearchFilters;
use crate::fuzzy::fuzzy_match;
use crate::scorer::score;
use crate::tokenizer::tokenize;
use crate::{Document, SearchResult};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The subset of [`SearchConfig`] the algorithm reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub fuzzy_threshold: f64,
    pub max_results: usize,
    pub min_query_length: usize,
    pub include_matched_terms: bool,
}

impl From<&SearchConfig> for SearchParams {
    fn from(cfg: &SearchConfig) -> Self {
        Self {
            fuzzy_threshold: cfg.fuzzy_threshold,
            max_results: cfg.max_results,
            min_query_length: cfg.min_query_length,
            include_matched_terms: cfg.include_matched_terms,
        }
    }
}

impl Default for SearchParams {
    fn default() -> Self { SearchParams::from(&SearchConfig::default()) }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutput {
    /// Matches before truncation to `max_results`.
    pub total: usize,
    pub results: Vec<SearchResult>,
}

/// True when the query is too short to be scored.
pub fn is_browse_query(query: &str, min_query_length: usize) -> bool {
    let significant = query.chars().filter(|c| !c.is_whitespace()).count();
    significant == 0 || significant < min_query_length
}

/// Terms of `terms` found in `text` verbatim or fuzzily.
pub fn terms_found<'a>(terms: &'a [String], text: &str, threshold: f64) -> Vec<&'a String> {
    terms
        .iter()
        .filter(|term| text.contains(term.as_str()) || fuzzy_match(term, text, threshold))
        .collect()
}

pub fn execute(
    docs: &[Document],
    query: &str,
    filters: &SearchFilters,
    params: &SearchParams,
    now: OffsetDateTime,
) -> SearchOutput {
    let filtered = filters.apply(docs);

    if is_browse_query(query, params.min_query_length) {
        let total = filtered.len();
        let results = filtered
            .into_iter()
            .take(params.max_results)
            .map(|doc| SearchResult { document: doc.clone(), score: 0.0, matched_terms: None })
            .collect();
        return SearchOutput { total, results };
    }

    let terms = tokenize(query);
    let mut scored: Vec<SearchResult> = Vec::new();
    for doc in filtered {
        let text = doc.searchable_text();
        let matched = terms_found(&terms, &text, params.fuzzy_threshold);
        if matched.len() != terms.len() {
            continue;
        }
        let matched_terms = params
            .include_matched_terms
            .then(|| matched.into_iter().cloned().collect());
        scored.push(SearchResult { document: doc.clone(), score: score(doc, &terms, now), matched_terms });
    }

    // sort_by is stable: equal scores keep input order
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let total = scored.len();
    scored.truncate(params.max_results);
    SearchOutput { total, results: scored }
}
