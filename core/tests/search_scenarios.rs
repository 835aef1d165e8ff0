use fieldnote_core::error::{SearchError, StoreError};
use fieldnote_core::fuzzy::fuzzy_match;
use fieldnote_core::worker::SearchWorker;
use fieldnote_core::{
    Category, Document, DocumentStore, ExecutionMode, MemoryStore, SearchConfig, SearchEngine, SearchFilters,
};
use std::io;
use time::{Duration, OffsetDateTime};

fn aged(doc: Document, days: i64) -> Document { doc.created(OffsetDateTime::now_utc() - Duration::days(days)) }

fn engine_with(docs: Vec<Document>, config: SearchConfig) -> SearchEngine<MemoryStore> {
    let engine = SearchEngine::new(MemoryStore::from_documents(docs), config).unwrap();
    engine.load().unwrap();
    engine
}

fn desert() -> Document {
    Document::new("1", "Desert Survival", "finding water in desert").with_tags(["survival", "water"])
}

fn ids(resp: &fieldnote_core::SearchResponse) -> Vec<&str> {
    resp.results.iter().map(|r| r.document.id.as_str()).collect()
}

#[tokio::test]
async fn scenario_a_title_hit_is_the_only_result() {
    let engine = engine_with(vec![desert()], SearchConfig::default());
    let resp = engine.search("desert", &SearchFilters::default()).await.unwrap();
    assert_eq!(ids(&resp), vec!["1"]);
    assert!(resp.results[0].score >= 10.0);
    assert_eq!(resp.total, 1);
}

#[tokio::test]
async fn scenario_b_exact_title_outranks_content_mention() {
    let docs = vec![
        aged(Document::new("content", "Morning notes", "brewed some tea by the fire"), 60),
        aged(Document::new("exact", "Tea", "green leaves"), 60),
    ];
    let engine = engine_with(docs, SearchConfig::default());
    let resp = engine.search("tea", &SearchFilters::default()).await.unwrap();
    assert_eq!(ids(&resp), vec!["exact", "content"]);
    assert!(resp.results[0].score > resp.results[1].score);
}

#[tokio::test]
async fn scenario_c_empty_query_returns_everything_unscored() {
    let docs = vec![Document::new("a", "one", ""), Document::new("b", "two", ""), Document::new("c", "three", "")];
    let engine = engine_with(docs, SearchConfig::default());
    let resp = engine.search("", &SearchFilters::default()).await.unwrap();
    assert_eq!(ids(&resp), vec!["a", "b", "c"]);
    assert!(resp.results.iter().all(|r| r.score == 0.0));
}

#[tokio::test]
async fn scenario_d_fuzzy_threshold_controls_typo_tolerance() {
    // one substitution in six chars: similarity 1 - 1/6
    assert!(fuzzy_match("desirt", "finding water in desert", 0.8));

    let engine = engine_with(vec![desert()], SearchConfig::default());
    let resp = engine.search("desirt", &SearchFilters::default()).await.unwrap();
    assert_eq!(ids(&resp), vec!["1"]);

    engine.set_fuzzy_threshold(0.95).unwrap();
    let resp = engine.search("desirt", &SearchFilters::default()).await.unwrap();
    assert!(resp.results.is_empty());
}

#[tokio::test]
async fn scenario_e_category_filter_narrows_with_and_semantics() {
    let docs = vec![
        Document::new("r1", "Flatbread", "flour water salt").with_category(Category::Recipe),
        Document::new("r2", "Camp stew", "beans and water").with_category(Category::Recipe),
        Document::new("s1", "Find water", "dig near reeds").with_category(Category::Survival),
        Document::new("n1", "Untagged water note", ""),
    ];
    let engine = engine_with(docs, SearchConfig::default());
    let recipes = SearchFilters { category: Some(Category::Recipe), ..Default::default() };

    let browse = engine.search("", &recipes).await.unwrap();
    assert_eq!(ids(&browse), vec!["r1", "r2"]);

    let narrowed = engine.search("flour", &recipes).await.unwrap();
    assert_eq!(ids(&narrowed), vec!["r1"]);

    let everywhere = engine.search("water", &SearchFilters::default()).await.unwrap();
    assert_eq!(everywhere.total, 4);
}

#[tokio::test]
async fn scenario_f_reindex_recovers_from_divergence() {
    let store = MemoryStore::new();
    store.put(desert()).unwrap();
    let engine = SearchEngine::new(store, SearchConfig::default()).unwrap();
    engine.load().unwrap();

    // bulk import behind the index's back, plus a stale entry the store no longer has
    engine.index_document(Document::new("ghost", "Phantom", "stale"));
    engine.store().put(Document::new("2", "Compass bearing", "north star")).unwrap();
    assert!(!engine.is_consistent().unwrap());
    assert!(engine.suggest("phan", 5).contains(&"phantom".to_string()));

    let stats = engine.reindex().unwrap();
    assert_eq!(stats.documents, 2);
    assert!(engine.is_consistent().unwrap());
    assert!(engine.suggest("phan", 5).is_empty());
    assert_eq!(engine.suggest("comp", 5), vec!["compass"]);
}

#[tokio::test]
async fn results_are_capped_by_max_results() {
    let docs: Vec<Document> = (0..30).map(|i| Document::new(format!("{i}"), "rope knot", "")).collect();
    let cfg = SearchConfig { max_results: 5, ..Default::default() };
    let engine = engine_with(docs, cfg);
    let resp = engine.search("rope", &SearchFilters::default()).await.unwrap();
    assert_eq!(resp.results.len(), 5);
    assert_eq!(resp.total, 30);
}

#[tokio::test]
async fn worker_and_synchronous_paths_agree() {
    let docs = vec![
        aged(desert(), 2),
        aged(Document::new("2", "Water purification", "boil water for a minute"), 10),
        aged(Document::new("3", "Tea", "water and leaves"), 100),
    ];
    let cfg = SearchConfig { execution: ExecutionMode::Worker, ..Default::default() };
    let engine = engine_with(docs, cfg);
    let filters = SearchFilters::default();

    let remote = engine.search("water", &filters).await.unwrap();
    let local = engine.search_blocking("water", &filters).unwrap();
    assert_eq!(ids(&remote), ids(&local));
    let remote_scores: Vec<f64> = remote.results.iter().map(|r| r.score).collect();
    let local_scores: Vec<f64> = local.results.iter().map(|r| r.score).collect();
    assert_eq!(remote_scores, local_scores);
}

#[tokio::test]
async fn worker_start_failure_falls_back_silently() {
    let cfg = SearchConfig { execution: ExecutionMode::Worker, ..Default::default() };
    let engine = SearchEngine::with_worker_factory(MemoryStore::from_documents(vec![desert()]), cfg, || -> io::Result<SearchWorker> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "no threads here"))
    })
    .unwrap();
    let resp = engine.search("desert", &SearchFilters::default()).await.unwrap();
    assert_eq!(ids(&resp), vec!["1"]);
}

#[tokio::test]
async fn auto_mode_uses_worker_for_large_corpora_with_same_results() {
    let docs: Vec<Document> = (0..40).map(|i| Document::new(format!("{i}"), format!("note {i}"), "shelter")).collect();
    let cfg = SearchConfig { execution: ExecutionMode::Auto, worker_min_documents: 10, ..Default::default() };
    let engine = engine_with(docs, cfg);
    let resp = engine.search("shelter", &SearchFilters::default()).await.unwrap();
    assert_eq!(resp.total, 40);
}

struct BrokenStore;

impl DocumentStore for BrokenStore {
    fn get_all(&self) -> Result<Vec<Document>, StoreError> { Err(StoreError::Backend("disk unplugged".into())) }
    fn get(&self, _id: &str) -> Result<Option<Document>, StoreError> { Err(StoreError::Backend("disk unplugged".into())) }
    fn put(&self, _doc: Document) -> Result<(), StoreError> { Err(StoreError::Backend("disk unplugged".into())) }
    fn delete(&self, _id: &str) -> Result<bool, StoreError> { Err(StoreError::Backend("disk unplugged".into())) }
}

#[tokio::test]
async fn storage_failure_is_reported_not_hidden() {
    let engine = SearchEngine::new(BrokenStore, SearchConfig::default()).unwrap();
    let err = engine.search("anything", &SearchFilters::default()).await.unwrap_err();
    assert!(matches!(err, SearchError::Storage(_)));
    assert!(err.to_string().contains("disk unplugged"));
    assert!(engine.reindex().is_err());
}

#[tokio::test]
async fn malformed_documents_do_not_break_a_rebuild() {
    let docs = vec![Document::new("", "orphan", "no id"), desert()];
    let engine = SearchEngine::new(MemoryStore::from_documents(docs), SearchConfig::default()).unwrap();
    let stats = engine.load().unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(engine.num_indexed(), 1);
    assert!(engine.suggest("orph", 3).is_empty());
}

#[tokio::test]
async fn removal_and_update_flow_through_the_engine() {
    let engine = engine_with(vec![desert()], SearchConfig::default());
    engine.index_document(Document::new("1", "Mountain Survival", "finding snow"));
    assert!(engine.suggest("des", 5).is_empty());
    assert!(engine.remove_document("1"));
    assert_eq!(engine.num_terms(), 0);
}
