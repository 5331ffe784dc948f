use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tern_crawler::{parse_seed, CrawlConfig, Crawler, Url};
use tern_engine::{persist, IndexPaths, SearchHit, SearchIndex};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}
fn default_limit() -> usize {
    10
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub total_results: usize,
    /// Query latency in seconds.
    pub search_time: f64,
}

#[derive(Deserialize)]
pub struct CrawlRequest {
    pub urls: Vec<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}
fn default_max_pages() -> usize {
    50
}

#[derive(Serialize)]
pub struct CrawlResponse {
    pub message: String,
    pub max_pages: usize,
    pub status: String,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub total_documents: usize,
    pub index_size: usize,
    pub status: String,
}

#[derive(Serialize)]
pub struct DocResponse {
    pub id: String,
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Shared server state. The whole index sits behind one lock so every
/// request sees a consistent corpus; handlers clone the `Arc`, never
/// the index.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<RwLock<SearchIndex>>,
    pub index_dir: PathBuf,
}

pub fn build_app(index_dir: String) -> Result<Router> {
    // A missing snapshot starts fresh; an unreadable one refuses to boot
    // rather than quietly serving an empty corpus.
    let paths = IndexPaths::new(&index_dir);
    let index = match persist::load(&paths)? {
        Some(index) => index,
        None => {
            tracing::info!(root = %index_dir, "no snapshot found, starting empty");
            SearchIndex::new()
        }
    };
    let state = AppState {
        index: Arc::new(RwLock::new(index)),
        index_dir: PathBuf::from(index_dir),
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:id", get(doc_handler))
        .route("/crawl", post(crawl_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);
    Ok(app)
}

pub async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "tern search API",
        "status": "running",
    }))
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    if params.q.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "query cannot be empty".into()));
    }
    let start = Instant::now();
    let limit = params.limit.min(100);
    let results = state.index.read().search(&params.q, limit);

    Ok(Json(SearchResponse {
        query: params.q,
        total_results: results.len(),
        results,
        search_time: start.elapsed().as_secs_f64(),
    }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocResponse>, (StatusCode, String)> {
    let index = state.index.read();
    match index.document(&id) {
        Some(doc) => Ok(Json(DocResponse {
            id: doc.id.clone(),
            title: doc.title.clone(),
            url: doc.url.clone(),
            snippet: doc.snippet.clone(),
        })),
        None => Err((StatusCode::NOT_FOUND, "document not found".into())),
    }
}

pub async fn crawl_handler(
    State(state): State<AppState>,
    Json(req): Json<CrawlRequest>,
) -> Result<Json<CrawlResponse>, (StatusCode, String)> {
    let seeds: Vec<Url> = req.urls.iter().filter_map(|u| parse_seed(u)).collect();
    if seeds.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "no valid seed URLs provided".into()));
    }

    let config = CrawlConfig {
        max_pages: req.max_pages,
        ..CrawlConfig::default()
    };
    let seed_count = seeds.len();
    tokio::spawn(run_crawl(state.clone(), config, seeds));

    Ok(Json(CrawlResponse {
        message: format!("crawl started for {} seed URLs", seed_count),
        max_pages: req.max_pages,
        status: "processing".to_string(),
    }))
}

/// Background crawl: pages stream into the shared index as they arrive,
/// then the whole index is snapshotted once the crawl settles.
async fn run_crawl(state: AppState, config: CrawlConfig, seeds: Vec<Url>) {
    let mut crawler = match Crawler::new(config) {
        Ok(crawler) => crawler,
        Err(err) => {
            tracing::error!(error = %err, "failed to build crawler");
            return;
        }
    };

    let index = state.index.clone();
    let summary = match crawler
        .run(seeds, move |page| {
            index
                .write()
                .add_document(&page.id, &page.title, &page.body, &page.url);
        })
        .await
    {
        Ok(summary) => summary,
        Err(err) => {
            tracing::error!(error = %err, "crawl failed");
            return;
        }
    };
    tracing::info!(
        indexed = summary.pages_indexed,
        visited = summary.pages_visited,
        "crawl complete"
    );

    let saved = tokio::task::spawn_blocking(move || {
        let paths = IndexPaths::new(&state.index_dir);
        let index = state.index.read();
        persist::save(&paths, &index)
    })
    .await;
    match saved {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(error = %err, "failed to save snapshot"),
        Err(err) => tracing::error!(error = %err, "snapshot task panicked"),
    }
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let index = state.index.read();
    Json(StatsResponse {
        total_documents: index.total_docs(),
        index_size: index.num_terms(),
        status: "healthy".to_string(),
    })
}
