use crate::tokenizer::unique_terms;
use crate::{DocId, Document};
use std::collections::{HashMap, HashSet};

/// What happened to a document handed to [`InvertedIndex::index_document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed,
    /// The id was already present; its old terms were dropped first.
    Replaced,
    /// No usable id; left out of the index.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub documents: usize,
    pub terms: usize,
    pub skipped: usize,
}

/// Term -> document ids, plus the cached copy of every indexed document.
///
/// Term sets are never left empty: removing the last id of a term removes the term.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, HashSet<DocId>>,
    docs: HashMap<DocId, Document>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    pub fn num_docs(&self) -> usize { self.docs.len() }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    pub fn doc_ids(&self, term: &str) -> Option<&HashSet<DocId>> { self.postings.get(term) }

    pub fn contains_term(&self, term: &str) -> bool { self.postings.contains_key(term) }

    pub fn get(&self, id: &str) -> Option<&Document> { self.docs.get(id) }

    pub fn documents(&self) -> impl Iterator<Item = &Document> { self.docs.values() }

    pub fn index_document(&mut self, doc: Document) -> IndexOutcome {
        if !doc.has_valid_id() {
            tracing::warn!(title = %doc.title, "skipping document without id");
            return IndexOutcome::Skipped;
        }
        let replaced = self.remove_document(&doc.id);
        for term in unique_terms(&doc.searchable_text()) {
            self.postings.entry(term).or_default().insert(doc.id.clone());
        }
        self.docs.insert(doc.id.clone(), doc);
        if replaced { IndexOutcome::Replaced } else { IndexOutcome::Indexed }
    }

    /// Drop `id` from every term set of its cached text. Returns false when the id is unknown.
    pub fn remove_document(&mut self, id: &str) -> bool {
        let Some(doc) = self.docs.remove(id) else { return false };
        for term in unique_terms(&doc.searchable_text()) {
            if let Some(ids) = self.postings.get_mut(&term) {
                ids.remove(id);
                if ids.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
        true
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.docs.clear();
    }

    /// Clear everything and index `docs` from scratch.
    pub fn rebuild<I>(&mut self, docs: I) -> RebuildStats
    where
        I: IntoIterator<Item = Document>,
    {
        self.clear();
        let mut skipped = 0;
        for doc in docs {
            if self.index_document(doc) == IndexOutcome::Skipped {
                skipped += 1;
            }
        }
        let stats = RebuildStats { documents: self.num_docs(), terms: self.num_terms(), skipped };
        tracing::info!(documents = stats.documents, terms = stats.terms, skipped, "index rebuilt");
        stats
    }

    /// True when the index holds exactly the terms and ids derivable from `docs`.
    pub fn is_consistent_with(&self, docs: &[Document]) -> bool {
        let mut expected = InvertedIndex::new();
        for doc in docs.iter().filter(|d| d.has_valid_id()) {
            expected.index_document(doc.clone());
        }
        expected.postings == self.postings
            && expected.docs.len() == self.docs.len()
            && expected.docs.keys().all(|id| self.docs.contains_key(id))
    }

    /// Completions for the last token of `query`, most common first.
    ///
    /// The token itself is never suggested. A query ending in whitespace has no token to
    /// complete and yields nothing.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<String> {
        let prefix = query.rsplit(char::is_whitespace).next().unwrap_or("").to_lowercase();
        if prefix.is_empty() || limit == 0 {
            return Vec::new();
        }
        let mut hits: Vec<(&String, usize)> = self
            .postings
            .iter()
            .filter(|(term, _)| term.starts_with(&prefix) && **term != prefix)
            .map(|(term, ids)| (term, ids.len()))
            .collect();
        hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        hits.into_iter().take(limit).map(|(term, _)| term.clone()).collect()
    }
}
