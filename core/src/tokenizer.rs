use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref PUNCT: Regex = Regex::new(r"[^\w\s]").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize text into index terms: lowercase, punctuation to spaces, whitespace split, stopword removal.
///
/// The same function is applied to document searchable text and to queries, so both sides
/// agree on what a term is. Duplicates are kept in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = PUNCT.replace_all(&lowered, " ");
    cleaned
        .split_whitespace()
        .filter(|t| !is_stopword(t))
        .map(str::to_string)
        .collect()
}

/// Distinct terms of `text`, first occurrence order preserved.
pub fn unique_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text).into_iter().filter(|t| seen.insert(t.clone())).collect()
}
