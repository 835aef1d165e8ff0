use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use fieldnote_core::filter::parse_date;
use fieldnote_core::{
    Category, ConfigError, Document, DocumentStore, IndexOutcome, MemoryStore, SearchConfig, SearchEngine,
    SearchError, SearchFilters, SledStore, StoreError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub type Engine = SearchEngine<Box<dyn DocumentStore>>;

type ApiError = (StatusCode, String);

/// Requests carrying the same value supersede each other on the worker; others never do.
pub const SESSION_HEADER: &str = "x-search-session";

#[derive(Deserialize, Default)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub category: Option<String>,
    pub language: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    /// Comma separated; any one matches.
    pub tags: Option<String>,
    pub has_media: Option<bool>,
    pub has_location: Option<bool>,
    pub limit: Option<usize>,
}

impl SearchParams {
    fn filters(&self) -> Result<SearchFilters, String> {
        let category = match self.category.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => Some(raw.parse::<Category>()?),
            None => None,
        };
        Ok(SearchFilters {
            category,
            language: self.language.clone().filter(|s| !s.trim().is_empty()),
            date_from: self.date_from.as_deref().map(parse_date).transpose()?,
            date_to: self.date_to.as_deref().map(parse_date).transpose()?,
            tags: self
                .tags
                .as_deref()
                .map(|raw| raw.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect())
                .unwrap_or_default(),
            has_media: self.has_media,
            has_location: self.has_location,
        })
    }
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub title: String,
    pub category: Option<Category>,
    pub tags: Vec<String>,
    pub matched_terms: Option<Vec<String>>,
    pub snippet: Option<String>,
}

#[derive(Deserialize)]
pub struct SuggestParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_suggest_limit")]
    pub limit: usize,
}
fn default_suggest_limit() -> usize { 5 }

#[derive(Serialize)]
pub struct SuggestResponse {
    pub query: String,
    pub suggestions: Vec<String>,
}

#[derive(Deserialize)]
pub struct ConfigPatch {
    pub fuzzy_threshold: Option<f64>,
    pub max_results: Option<usize>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub admin_token: Option<String>,
}

/// Open the store (sled at `store_path`, in-memory otherwise) and build the index from it.
pub fn open_engine(store_path: Option<&str>, config: SearchConfig) -> Result<Engine> {
    let store: Box<dyn DocumentStore> = match store_path {
        Some(path) => Box::new(SledStore::open(path)?),
        None => Box::new(MemoryStore::new()),
    };
    let engine = SearchEngine::new(store, config)?;
    let stats = engine.load()?;
    tracing::info!(documents = stats.documents, terms = stats.terms, skipped = stats.skipped, "index loaded");
    Ok(engine)
}

pub fn build_app(engine: Arc<Engine>, admin_token: Option<String>) -> Router {
    let app_state = AppState { engine, admin_token };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/suggest", get(suggest_handler))
        .route("/doc/:id", get(doc_handler))
        .route("/documents", post(put_document))
        .route("/documents/:id", axum::routing::delete(delete_document))
        .route("/index/rebuild", post(rebuild_index))
        .route("/config", put(update_config).get(show_config))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let filters = params.filters().map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let session = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()).filter(|s| !s.is_empty());
    let found = state.engine.search_as(session, &params.q, &filters).await.map_err(search_error)?;

    let limit = params.limit.unwrap_or(usize::MAX).max(1);
    let raw_terms: Vec<String> = params.q.split_whitespace().map(|s| s.to_string()).collect();
    let results = found
        .results
        .into_iter()
        .take(limit)
        .map(|hit| {
            let snippet = snippet_from_text(&hit.document.content, &raw_terms);
            SearchHit {
                id: hit.document.id,
                score: hit.score,
                title: hit.document.title,
                category: hit.document.category,
                tags: hit.document.tags,
                matched_terms: hit.matched_terms,
                snippet,
            }
        })
        .collect();

    Ok(Json(SearchResponse {
        query: found.query,
        took_ms: found.took_ms,
        took_s: found.took_s,
        total_hits: found.total,
        results,
    }))
}

pub async fn suggest_handler(State(state): State<AppState>, Query(params): Query<SuggestParams>) -> Json<SuggestResponse> {
    let suggestions = state.engine.suggest(&params.q, params.limit.min(50));
    Json(SuggestResponse { query: params.q, suggestions })
}

pub async fn doc_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Document>, ApiError> {
    match state.engine.store().get(&id).map_err(store_error)? {
        Some(doc) => Ok(Json(doc)),
        None => Err((StatusCode::NOT_FOUND, format!("document '{id}' not found"))),
    }
}

async fn put_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(doc): Json<Document>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let id = doc.id.clone();
    let outcome = match state.engine.upsert(doc).map_err(search_error)? {
        IndexOutcome::Indexed => "indexed",
        IndexOutcome::Replaced => "replaced",
        IndexOutcome::Skipped => "skipped",
    };
    Ok(Json(serde_json::json!({ "id": id, "outcome": outcome })))
}

async fn delete_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    if !state.engine.delete(&id).map_err(search_error)? {
        return Err((StatusCode::NOT_FOUND, format!("document '{id}' not found")));
    }
    Ok(Json(serde_json::json!({ "id": id, "deleted": true })))
}

async fn rebuild_index(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let stats = state.engine.reindex().map_err(search_error)?;
    Ok(Json(serde_json::json!({
        "documents": stats.documents,
        "terms": stats.terms,
        "skipped": stats.skipped,
    })))
}

async fn show_config(State(state): State<AppState>) -> Json<SearchConfig> { Json(state.engine.config()) }

async fn update_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(patch): Json<ConfigPatch>,
) -> Result<Json<SearchConfig>, ApiError> {
    authorize(&state, &headers)?;
    let mut next = state.engine.config();
    if let Some(threshold) = patch.fuzzy_threshold {
        next.set_fuzzy_threshold(threshold).map_err(config_error)?;
    }
    if let Some(max_results) = patch.max_results {
        next.set_max_results(max_results).map_err(config_error)?;
    }
    state.engine.update_config(next).map_err(config_error)?;
    Ok(Json(state.engine.config()))
}

fn search_error(err: SearchError) -> ApiError {
    let status = match &err {
        SearchError::Storage(StoreError::MissingId { .. }) => StatusCode::BAD_REQUEST,
        SearchError::Storage(_) | SearchError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        SearchError::Superseded => StatusCode::CONFLICT,
        SearchError::WorkerTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
    };
    (status, err.to_string())
}

fn store_error(err: StoreError) -> ApiError {
    let status = match &err {
        StoreError::MissingId { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn config_error(err: ConfigError) -> ApiError { (StatusCode::BAD_REQUEST, err.to_string()) }

fn snippet_from_text(text: &str, raw_terms: &[String]) -> Option<String> {
    if text.is_empty() { return None; }
    // find first match (case-insensitive) of any raw term
    let first_idx = raw_terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .find_map(|t| find_case_insensitive(text, t));
    let snippet = match first_idx {
        Some(idx) => {
            let start = floor_char_boundary(text, idx.saturating_sub(100));
            let end = floor_char_boundary(text, (idx + 200).min(text.len()));
            text[start..end].to_string()
        }
        None => text.chars().take(200).collect(),
    };
    Some(highlight_terms(&snippet, raw_terms))
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn term_pattern(term: &str) -> Option<regex::Regex> {
    regex::RegexBuilder::new(&regex::escape(term)).case_insensitive(true).build().ok()
}

/// Byte offset of the first case-insensitive match of `needle` in `haystack` itself.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    term_pattern(needle)?.find(haystack).map(|m| m.start())
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        if t.trim().is_empty() { continue; }
        let Some(pat) = term_pattern(t) else {
            continue;
        };
        s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
    }
    s
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
