use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::tempdir;
use tern_engine::{persist, IndexPaths, SearchIndex};
use tower::ServiceExt;

fn build_tiny_snapshot(dir: &std::path::Path) {
    let mut index = SearchIndex::new();
    index.add_document(
        "doc-cats",
        "Cats",
        "Cats are small furry animals that purr. Cats sleep most of the day \
         and cats groom themselves constantly.",
        "https://example.com/cats",
    );
    index.add_document(
        "doc-dogs",
        "Dogs",
        "Dogs are loyal animals that bark at strangers and chase balls in the park.",
        "https://example.com/dogs",
    );
    index.add_document(
        "doc-both",
        "Cats and Dogs",
        "Cats and dogs can share a home peacefully once territory questions settle.",
        "https://example.com/both",
    );
    persist::save(&IndexPaths::new(dir), &index).unwrap();
}

fn app_over_snapshot(dir: &std::path::Path) -> Router {
    build_tiny_snapshot(dir);
    tern_server::build_app(dir.to_string_lossy().to_string()).unwrap()
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    let app = app_over_snapshot(dir.path());

    let (status, body) = get(app, "/search?q=cats&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "cats");
    assert_eq!(body["total_results"], 2);

    let ids: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|hit| hit["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"doc-cats"));
    assert!(ids.contains(&"doc-both"));
    assert!(!ids.contains(&"doc-dogs"));

    assert!(body["search_time"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn limit_truncates_results() {
    let dir = tempdir().unwrap();
    let app = app_over_snapshot(dir.path());

    let (status, body) = get(app, "/search?q=cats&limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["total_results"], 1);
}

#[tokio::test]
async fn blank_queries_are_rejected() {
    let dir = tempdir().unwrap();
    let app = app_over_snapshot(dir.path());
    let (status, _) = get(app, "/search?q=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_query_parameter_is_rejected() {
    let dir = tempdir().unwrap();
    let app = app_over_snapshot(dir.path());
    let (status, _) = get(app, "/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_terms_return_an_empty_result_set() {
    let dir = tempdir().unwrap();
    let app = app_over_snapshot(dir.path());

    let (status, body) = get(app, "/search?q=zeppelin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_results"], 0);
    assert!(body["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn stats_reports_corpus_counts() {
    let dir = tempdir().unwrap();
    let app = app_over_snapshot(dir.path());

    let (status, body) = get(app, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_documents"], 3);
    assert!(body["index_size"].as_u64().unwrap() > 0);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn documents_are_retrievable_by_id() {
    let dir = tempdir().unwrap();
    let app = app_over_snapshot(dir.path());

    let (status, body) = get(app.clone(), "/doc/doc-cats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "doc-cats");
    assert_eq!(body["title"], "Cats");
    assert_eq!(body["url"], "https://example.com/cats");

    let (status, _) = get(app, "/doc/no-such-doc").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn server_starts_empty_without_a_snapshot() {
    let dir = tempdir().unwrap();
    let app = tern_server::build_app(dir.path().to_string_lossy().to_string()).unwrap();

    let (status, body) = get(app.clone(), "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_documents"], 0);
    assert_eq!(body["index_size"], 0);

    let (status, body) = get(app, "/search?q=anything").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_results"], 0);
}

#[tokio::test]
async fn corrupt_snapshots_refuse_to_boot() {
    let dir = tempdir().unwrap();
    build_tiny_snapshot(dir.path());
    std::fs::write(dir.path().join("snapshot.bin"), b"garbage").unwrap();
    assert!(tern_server::build_app(dir.path().to_string_lossy().to_string()).is_err());
}

#[tokio::test]
async fn crawl_requires_valid_seeds() {
    let dir = tempdir().unwrap();
    let app = app_over_snapshot(dir.path());

    let (status, _) = post_json(app.clone(), "/crawl", json!({ "urls": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(app, "/crawl", json!({ "urls": ["", "# nope"] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_endpoint_responds() {
    let dir = tempdir().unwrap();
    let app = app_over_snapshot(dir.path());

    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}
