use crate::config::{ExecutionMode, SearchConfig};
use crate::engine::{SearchOutput, SearchParams};
use crate::error::{ConfigError, SearchError};
use crate::filter::SearchFilters;
use crate::index::{IndexOutcome, InvertedIndex, RebuildStats};
use crate::store::DocumentStore;
use crate::worker::{SearchWorker, WorkerRequest};
use crate::{Document, SearchResult};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::io;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    /// Matches before truncation.
    pub total: usize,
    pub took_ms: u128,
    pub took_s: f64,
    pub results: Vec<SearchResult>,
}

/// Entry point of the search subsystem.
///
/// Construct one per application and share it by reference. The inverted index serves
/// suggestions and removal; ranking always runs over the documents fetched from the store.
pub struct SearchEngine<S> {
    store: S,
    index: RwLock<InvertedIndex>,
    config: RwLock<SearchConfig>,
    worker: Mutex<Option<SearchWorker>>,
}

impl<S: DocumentStore> SearchEngine<S> {
    pub fn new(store: S, config: SearchConfig) -> Result<Self, ConfigError> {
        Self::with_worker_factory(store, config, SearchWorker::spawn)
    }

    /// Like [`SearchEngine::new`] with a custom way to start the background worker.
    pub fn with_worker_factory<F>(store: S, config: SearchConfig, factory: F) -> Result<Self, ConfigError>
    where
        F: FnOnce() -> io::Result<SearchWorker>,
    {
        config.validate()?;
        let worker = match config.execution {
            ExecutionMode::Sync => None,
            ExecutionMode::Worker | ExecutionMode::Auto => start_worker(factory),
        };
        Ok(Self {
            store,
            index: RwLock::new(InvertedIndex::new()),
            config: RwLock::new(config),
            worker: Mutex::new(worker),
        })
    }

    pub fn store(&self) -> &S { &self.store }

    pub fn config(&self) -> SearchConfig { self.config.read().clone() }

    pub fn set_fuzzy_threshold(&self, threshold: f64) -> Result<(), ConfigError> {
        self.config.write().set_fuzzy_threshold(threshold)
    }

    pub fn set_max_results(&self, max_results: usize) -> Result<(), ConfigError> {
        self.config.write().set_max_results(max_results)
    }

    /// Replace the whole configuration; on error the current one stays.
    pub fn update_config(&self, config: SearchConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if config.execution != ExecutionMode::Sync {
            let mut worker = self.worker.lock();
            if worker.is_none() {
                *worker = start_worker(SearchWorker::spawn);
            }
        }
        *self.config.write() = config;
        Ok(())
    }

    /// Build the index from the store. Same as [`SearchEngine::reindex`].
    pub fn load(&self) -> Result<RebuildStats, SearchError> { self.reindex() }

    /// Throw the index away and rebuild it from the store.
    pub fn reindex(&self) -> Result<RebuildStats, SearchError> {
        let docs = self.store.get_all()?;
        Ok(self.index.write().rebuild(docs))
    }

    /// Whether the index still matches what the store holds.
    pub fn is_consistent(&self) -> Result<bool, SearchError> {
        let docs = self.store.get_all()?;
        Ok(self.index.read().is_consistent_with(&docs))
    }

    /// Intake for created or updated documents. Updates re-tokenize.
    pub fn index_document(&self, doc: Document) -> IndexOutcome { self.index.write().index_document(doc) }

    pub fn remove_document(&self, id: &str) -> bool { self.index.write().remove_document(id) }

    /// Write a document to the store and index it as one step.
    ///
    /// The index write lock is held across both, so concurrent upserts of one id leave the
    /// index holding whichever version the store kept.
    pub fn upsert(&self, doc: Document) -> Result<IndexOutcome, SearchError> {
        let mut index = self.index.write();
        self.store.put(doc.clone())?;
        Ok(index.index_document(doc))
    }

    /// Delete from the store and the index as one step. `false` if neither knew the id.
    pub fn delete(&self, id: &str) -> Result<bool, SearchError> {
        let mut index = self.index.write();
        let stored = self.store.delete(id)?;
        let indexed = index.remove_document(id);
        Ok(stored || indexed)
    }

    pub fn suggest(&self, query: &str, limit: usize) -> Vec<String> { self.index.read().suggest(query, limit) }

    pub fn num_indexed(&self) -> usize { self.index.read().num_docs() }

    pub fn num_terms(&self) -> usize { self.index.read().num_terms() }

    /// Search without a session: never superseded by other requests.
    pub async fn search(&self, query: &str, filters: &SearchFilters) -> Result<SearchResponse, SearchError> {
        self.search_as(None, query, filters).await
    }

    /// Search on behalf of `session`. On the worker, a newer search from the same session
    /// makes this one fail with [`SearchError::Superseded`] if it has not started yet.
    pub async fn search_as(
        &self,
        session: Option<&str>,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, SearchError> {
        let start = Instant::now();
        let config = self.config();
        let request = self.prepare(query, filters, &config)?;
        let use_worker = match config.execution {
            ExecutionMode::Sync => false,
            ExecutionMode::Worker => true,
            ExecutionMode::Auto => request.documents.len() >= config.worker_min_documents,
        };
        let (output, on_worker) = if use_worker {
            self.run_on_worker(&request, session, config.worker_timeout_ms).await?
        } else {
            (request.execute(), false)
        };
        Ok(finish(query, output.total, output.results, start, on_worker))
    }

    /// Run on the caller's thread regardless of the configured mode.
    pub fn search_blocking(&self, query: &str, filters: &SearchFilters) -> Result<SearchResponse, SearchError> {
        let start = Instant::now();
        let config = self.config();
        let output = self.prepare(query, filters, &config)?.execute();
        Ok(finish(query, output.total, output.results, start, false))
    }

    fn prepare(&self, query: &str, filters: &SearchFilters, config: &SearchConfig) -> Result<WorkerRequest, SearchError> {
        Ok(WorkerRequest {
            documents: self.store.get_all()?,
            query: query.to_string(),
            filters: filters.clone(),
            params: SearchParams::from(config),
            now: OffsetDateTime::now_utc(),
        })
    }

    /// The flag is `true` only when the worker produced the output.
    async fn run_on_worker(
        &self,
        request: &WorkerRequest,
        session: Option<&str>,
        timeout_ms: Option<u64>,
    ) -> Result<(SearchOutput, bool), SearchError> {
        let pending = {
            let mut slot = self.worker.lock();
            let submitted = slot.as_ref().map(|w| w.submit(request, session));
            match submitted {
                Some(Ok(pending)) => Some(pending),
                Some(Err(err)) => {
                    tracing::warn!(%err, "search worker unavailable, searching synchronously");
                    *slot = None;
                    None
                }
                None => None,
            }
        };
        match pending {
            Some(pending) => Ok((pending.wait(timeout_ms.map(Duration::from_millis)).await?, true)),
            None => Ok((request.execute(), false)),
        }
    }
}

fn start_worker<F>(factory: F) -> Option<SearchWorker>
where
    F: FnOnce() -> io::Result<SearchWorker>,
{
    match factory() {
        Ok(worker) => Some(worker),
        Err(err) => {
            tracing::warn!(%err, "could not start search worker, falling back to synchronous search");
            None
        }
    }
}

fn finish(query: &str, total: usize, results: Vec<SearchResult>, start: Instant, on_worker: bool) -> SearchResponse {
    let elapsed = start.elapsed();
    tracing::debug!(query, total, returned = results.len(), on_worker, took_ms = elapsed.as_millis() as u64, "search complete");
    SearchResponse {
        query: query.to_string(),
        total,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        results,
    }
}
