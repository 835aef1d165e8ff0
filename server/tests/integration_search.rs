use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use fieldnote_core::{Category, Document, DocumentStore, ExecutionMode, SearchConfig};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

const TOKEN: &str = "secret";

fn build_tiny_app(dir: &std::path::Path) -> Router { build_app_with(dir, SearchConfig::default()) }

fn build_app_with(dir: &std::path::Path, config: SearchConfig) -> Router {
    let path = dir.join("store").to_string_lossy().into_owned();
    let engine = server::open_engine(Some(path.as_str()), config).unwrap();
    let docs = vec![
        Document::new("1", "Desert Survival", "finding water in desert").with_tags(["survival", "water"]),
        Document::new("2", "Tea", "green leaves steeped in water").with_category(Category::Recipe),
        Document::new("3", "Flatbread", "flour water salt").with_category(Category::Recipe),
    ];
    for doc in docs {
        engine.store().put(doc).unwrap();
    }
    engine.reindex().unwrap();
    server::build_app(Arc::new(engine), Some(TOKEN.into()))
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::String(String::from_utf8_lossy(&body).into_owned()));
    (status, json)
}

fn get(uri: &str) -> Request<Body> { Request::get(uri).body(Body::empty()).unwrap() }

fn admin(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-ADMIN-TOKEN", TOKEN)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    let app = build_tiny_app(dir.path());

    let (status, json) = call(app, get("/search?q=desert")).await;
    assert_eq!(status, StatusCode::OK);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["id"], "1");
    assert!(arr[0]["score"].as_f64().unwrap() >= 10.0);
    assert!(arr[0]["snippet"].as_str().unwrap().contains("<em>desert</em>"));
}

#[tokio::test]
async fn search_applies_filters_and_limit() {
    let dir = tempdir().unwrap();
    let app = build_tiny_app(dir.path());

    let (status, json) = call(app.clone(), get("/search?q=water&category=recipe")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 2);

    let (_, json) = call(app.clone(), get("/search?q=water&limit=1")).await;
    assert_eq!(json["total_hits"], 3);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);

    let (status, _) = call(app, get("/search?q=water&category=gossip")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn suggest_completes_last_token() {
    let dir = tempdir().unwrap();
    let app = build_tiny_app(dir.path());
    let (status, json) = call(app, get("/suggest?q=find%20wat&limit=3")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["suggestions"][0], "water");
}

#[tokio::test]
async fn documents_can_be_added_and_removed() {
    let dir = tempdir().unwrap();
    let app = build_tiny_app(dir.path());

    let doc = serde_json::json!({
        "id": "4",
        "title": "Signal mirror",
        "content": "flash toward aircraft",
        "created_at": "2024-05-01T10:00:00Z"
    });
    let (status, json) = call(app.clone(), admin("POST", "/documents", doc)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "indexed");

    let (_, json) = call(app.clone(), get("/search?q=mirror")).await;
    assert_eq!(json["results"][0]["id"], "4");

    let (status, json) = call(app.clone(), get("/doc/4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "Signal mirror");

    let (status, _) = call(app.clone(), admin("DELETE", "/documents/4", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, json) = call(app.clone(), get("/suggest?q=mirr")).await;
    assert!(json["suggestions"].as_array().unwrap().is_empty());

    let (status, _) = call(app, get("/doc/4")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn write_endpoints_require_token() {
    let dir = tempdir().unwrap();
    let app = build_tiny_app(dir.path());
    let req = Request::post("/index/rebuild").body(Body::empty()).unwrap();
    let (status, _) = call(app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_config_is_rejected_and_previous_kept() {
    let dir = tempdir().unwrap();
    let app = build_tiny_app(dir.path());

    let (status, _) = call(app.clone(), admin("PUT", "/config", serde_json::json!({ "fuzzy_threshold": 1.7 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = call(app.clone(), admin("PUT", "/config", serde_json::json!({ "max_results": 2 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["max_results"], 2);
    assert_eq!(json["fuzzy_threshold"], 0.8);

    let (_, json) = call(app, get("/search?q=water")).await;
    assert_eq!(json["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn rebuild_reports_counts() {
    let dir = tempdir().unwrap();
    let app = build_tiny_app(dir.path());
    let (status, json) = call(app, admin("POST", "/index/rebuild", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["documents"], 3);
    assert_eq!(json["skipped"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clients_on_the_worker_all_get_results() {
    let dir = tempdir().unwrap();
    let config = SearchConfig { execution: ExecutionMode::Worker, ..Default::default() };
    let app = build_app_with(dir.path(), config);

    let clients: Vec<_> = (0..6)
        .map(|client| {
            let app = app.clone();
            tokio::spawn(async move {
                let mut req = get("/search?q=water");
                if client % 2 == 0 {
                    let session = format!("client-{client}").parse().unwrap();
                    req.headers_mut().insert(server::SESSION_HEADER, session);
                }
                call(app, req).await
            })
        })
        .collect();
    for client in clients {
        let (status, json) = client.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_hits"], 3);
    }
}

#[tokio::test]
async fn upsert_replaces_the_indexed_version() {
    let dir = tempdir().unwrap();
    let app = build_tiny_app(dir.path());

    let doc = serde_json::json!({ "id": "2", "title": "Pine needle tea", "content": "vitamin c" });
    let (status, json) = call(app.clone(), admin("POST", "/documents", doc)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "replaced");

    let (_, json) = call(app.clone(), get("/suggest?q=vita")).await;
    assert_eq!(json["suggestions"][0], "vitamin");
    let (_, json) = call(app.clone(), get("/suggest?q=stee")).await;
    assert!(json["suggestions"].as_array().unwrap().is_empty());

    let nameless = serde_json::json!({ "id": "", "title": "nameless" });
    let (status, _) = call(app, admin("POST", "/documents", nameless)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
