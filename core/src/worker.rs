//! Background search context.
//!
//! The worker owns nothing shared with the orchestrator: every request carries a full
//! bincode-encoded copy of the documents, and the answer comes back as bytes over a oneshot
//! channel. A request tagged with a session key is answered with [`SearchError::Superseded`]
//! instead of being run once a newer request for the same session has been submitted.
//! Untagged requests, and requests from other sessions, never cancel each other.

use crate::engine::{self, SearchOutput, SearchParams};
use crate::error::SearchError;
use crate::filter::SearchFilters;
use crate::Document;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub documents: Vec<Document>,
    pub query: String,
    pub filters: SearchFilters,
    pub params: SearchParams,
    #[serde(with = "time::serde::rfc3339")]
    pub now: OffsetDateTime,
}

impl WorkerRequest {
    pub fn execute(&self) -> SearchOutput {
        engine::execute(&self.documents, &self.query, &self.filters, &self.params, self.now)
    }
}

#[derive(Debug)]
enum Reply {
    Done(Vec<u8>),
    Superseded,
    Failed(String),
}

/// Newest generation submitted per session key.
type Latest = Arc<Mutex<HashMap<String, u64>>>;

struct Job {
    generation: u64,
    session: Option<String>,
    payload: Vec<u8>,
    reply: oneshot::Sender<Reply>,
}

pub struct SearchWorker {
    jobs: mpsc::Sender<Job>,
    next: AtomicU64,
    latest: Latest,
}

impl SearchWorker {
    pub fn spawn() -> io::Result<Self> {
        let (jobs, rx) = mpsc::channel::<Job>();
        let latest = Latest::default();
        let seen = Arc::clone(&latest);
        thread::Builder::new()
            .name("search-worker".into())
            .spawn(move || run(rx, seen))?;
        Ok(Self { jobs, next: AtomicU64::new(0), latest })
    }

    /// Queue a request. With a session key, anything that session queued earlier becomes stale.
    pub fn submit(&self, request: &WorkerRequest, session: Option<&str>) -> Result<PendingSearch, SearchError> {
        let payload = bincode::serialize(request).map_err(|e| SearchError::Worker(e.to_string()))?;
        let generation = self.next.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(key) = session {
            let mut latest = self.latest.lock();
            let newest = latest.entry(key.to_string()).or_insert(generation);
            *newest = (*newest).max(generation);
        }
        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job { generation, session: session.map(str::to_string), payload, reply })
            .map_err(|_| SearchError::Worker("worker thread has stopped".into()))?;
        Ok(PendingSearch { rx })
    }

    /// A handle whose thread is already gone, as after a crash.
    #[cfg(test)]
    pub(crate) fn stopped() -> Self {
        let (jobs, rx) = mpsc::channel::<Job>();
        drop(rx);
        Self { jobs, next: AtomicU64::new(0), latest: Latest::default() }
    }
}

pub struct PendingSearch {
    rx: oneshot::Receiver<Reply>,
}

impl PendingSearch {
    pub async fn wait(self, timeout: Option<Duration>) -> Result<SearchOutput, SearchError> {
        let reply = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.rx)
                .await
                .map_err(|_| SearchError::WorkerTimeout(limit.as_millis() as u64))?,
            None => self.rx.await,
        };
        match reply.map_err(|_| SearchError::Worker("worker dropped the request".into()))? {
            Reply::Done(bytes) => bincode::deserialize(&bytes).map_err(|e| SearchError::Worker(e.to_string())),
            Reply::Superseded => Err(SearchError::Superseded),
            Reply::Failed(reason) => Err(SearchError::Worker(reason)),
        }
    }
}

fn run(rx: mpsc::Receiver<Job>, latest: Latest) {
    while let Ok(job) = rx.recv() {
        if job.reply.is_closed() {
            forget(&latest, &job);
            continue;
        }
        if is_stale(&latest, &job) {
            let _ = job.reply.send(Reply::Superseded);
            continue;
        }
        let reply = match handle(&job.payload) {
            Ok(bytes) => Reply::Done(bytes),
            Err(err) => Reply::Failed(err.to_string()),
        };
        forget(&latest, &job);
        let _ = job.reply.send(reply);
    }
    tracing::debug!("search worker stopped");
}

fn is_stale(latest: &Latest, job: &Job) -> bool {
    match &job.session {
        Some(key) => latest.lock().get(key).is_some_and(|&newest| job.generation < newest),
        None => false,
    }
}

/// Drop the session entry once its newest job is finished.
fn forget(latest: &Latest, job: &Job) {
    if let Some(key) = &job.session {
        let mut latest = latest.lock();
        if latest.get(key) == Some(&job.generation) {
            latest.remove(key);
        }
    }
}

fn handle(payload: &[u8]) -> bincode::Result<Vec<u8>> {
    let request: WorkerRequest = bincode::deserialize(payload)?;
    bincode::serialize(&request.execute())
}
