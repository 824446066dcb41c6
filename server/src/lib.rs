use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use documind_core::document::{Document, MatchKind, MetadataField, MetadataFilter};
use documind_core::extract::extract_upload;
use documind_core::persist::SnapshotPaths;
use documind_core::tokenizer::Normalizer;
use documind_core::{DocId, ExtractedDocument, SearchEngine, SearchError, SearchHit};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const PREVIEW_CHARS: usize = 200;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k: Option<usize>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub author_contains: Option<String>,
    pub title_contains: Option<String>,
    #[serde(default)]
    pub highlight: bool,
}

impl SearchParams {
    fn filters(&self) -> Vec<MetadataFilter> {
        let mut filters = Vec::new();
        if let Some(v) = &self.author { filters.push(MetadataFilter::equals(MetadataField::Author, v.clone())); }
        if let Some(v) = &self.title { filters.push(MetadataFilter::equals(MetadataField::Title, v.clone())); }
        if let Some(v) = &self.author_contains { filters.push(MetadataFilter::contains(MetadataField::Author, v.clone())); }
        if let Some(v) = &self.title_contains { filters.push(MetadataFilter::contains(MetadataField::Title, v.clone())); }
        filters
    }
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub filters: BTreeMap<String, String>,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Deserialize)]
pub struct UploadParams {
    pub filename: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    /// Where `/index/commit` writes snapshots; commits are refused without it
    pub snapshot_dir: Option<PathBuf>,
}

/// Engine errors mapped onto HTTP statuses, plus plain status errors.
pub enum ApiError {
    Engine(SearchError),
    Status(StatusCode, String),
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self { ApiError::Engine(err) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Engine(err) => {
                let status = match &err {
                    SearchError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    SearchError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
                    SearchError::NotFound(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(error = %err, "request failed");
                }
                (status, err.to_string())
            }
            ApiError::Status(status, message) => (status, message),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn build_app(engine: Arc<SearchEngine>, snapshot_dir: Option<PathBuf>) -> Router {
    let app_state = AppState { engine, snapshot_dir };

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

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/search", get(search_handler))
        .route("/stats", get(stats_handler))
        .route("/documents", get(list_handler).post(create_handler))
        .route("/documents/:doc_id", get(doc_handler).put(replace_handler).delete(delete_handler))
        .route("/upload", post(upload_handler))
        .route("/index/batch", post(index_batch))
        .route("/index/commit", post(index_commit))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "DocuMind API",
        "endpoints": {
            "upload": "/upload?filename= (POST, raw body)",
            "search": "/search?q=query (GET)",
            "documents": "/documents (GET, POST), /documents/:id (GET, PUT, DELETE)",
            "stats": "/stats (GET)",
            "batch": "/index/batch (POST)",
            "commit": "/index/commit (POST)",
        }
    }))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> ApiResult<Json<SearchResponse>> {
    let start = std::time::Instant::now();
    let filters = params.filters();
    let top_k = params.k.unwrap_or(state.engine.config().search.default_top_k);
    tracing::info!(q = %params.q, top_k, filters = filters.len(), "search");

    let query = documind_core::Query { raw_text: params.q.clone(), filters: filters.clone(), top_k };
    let outcome = state.engine.execute(&query)?;

    let mut results = outcome.hits;
    if params.highlight {
        let normalizer = state.engine.normalizer();
        let terms: HashSet<String> = normalizer.query_terms(&params.q).into_iter().collect();
        for hit in results.iter_mut() {
            hit.snippet = highlight_terms(&hit.snippet, &terms, normalizer);
        }
    }

    let filters = filters
        .iter()
        .map(|f| {
            let key = match f.kind {
                MatchKind::Equals => f.field.to_string(),
                MatchKind::Contains => format!("{}_contains", f.field),
            };
            (key, f.value.clone())
        })
        .collect();
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { query: params.q, filters, took_s: elapsed.as_secs_f64(), total_hits: outcome.total_hits, results }))
}

/// HTML-escape `snippet` and wrap every word that normalizes to a query term
/// in `<em>`. Words are split the same way the normalizer splits them.
fn highlight_terms(snippet: &str, terms: &HashSet<String>, normalizer: &Normalizer) -> String {
    let mut out = String::with_capacity(snippet.len() + 16);
    let mut word_start: Option<usize> = None;
    let flush = |out: &mut String, word: &str| {
        if normalizer.normalize(word).iter().any(|t| terms.contains(&t.term)) {
            out.push_str("<em>");
            escape_into(out, word);
            out.push_str("</em>");
        } else {
            escape_into(out, word);
        }
    };
    for (i, c) in snippet.char_indices() {
        if normalizer.is_boundary(c) {
            if let Some(start) = word_start.take() {
                flush(&mut out, &snippet[start..i]);
            }
            let mut buf = [0u8; 4];
            escape_into(&mut out, c.encode_utf8(&mut buf));
        } else if word_start.is_none() {
            word_start = Some(i);
        }
    }
    if let Some(start) = word_start {
        flush(&mut out, &snippet[start..]);
    }
    out
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

async fn stats_handler(State(state): State<AppState>) -> Json<documind_core::IndexStats> {
    Json(state.engine.stats())
}

async fn list_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "documents": state.engine.list() }))
}

async fn create_handler(State(state): State<AppState>, Json(doc): Json<ExtractedDocument>) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let id = state.engine.ingest(doc)?;
    tracing::info!(doc_id = id, "document created");
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

async fn replace_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<DocId>,
    Json(doc): Json<ExtractedDocument>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = state.engine.put(doc_id, doc)?;
    Ok(Json(serde_json::json!({ "id": id })))
}

async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> ApiResult<Json<Document>> {
    Ok(Json(state.engine.get(doc_id)?))
}

async fn delete_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> ApiResult<StatusCode> {
    if state.engine.remove(doc_id) {
        tracing::info!(doc_id, "document deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(SearchError::NotFound(doc_id).into())
    }
}

async fn upload_handler(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let extracted = extract_upload(&params.filename, &body).map_err(|e| {
        tracing::error!(filename = %params.filename, error = %e, "upload failed");
        ApiError::Status(StatusCode::BAD_REQUEST, e.to_string())
    })?;
    let id = state.engine.ingest(extracted)?;
    let doc = state.engine.get(id)?;
    let preview: String = doc.text.chars().take(PREVIEW_CHARS).collect();
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "success",
            "id": id,
            "metadata": doc.metadata,
            "content_preview": format!("{preview}..."),
        })),
    ))
}

/// All documents are validated before any is stored, so a bad record
/// rejects the whole batch.
async fn index_batch(State(state): State<AppState>, Json(docs): Json<Vec<ExtractedDocument>>) -> ApiResult<Json<serde_json::Value>> {
    for (i, doc) in docs.iter().enumerate() {
        Document::from_extracted(0, doc.clone())
            .map_err(|e| ApiError::Status(StatusCode::UNPROCESSABLE_ENTITY, format!("document {i}: {e}")))?;
    }
    let mut ids = Vec::with_capacity(docs.len());
    for doc in docs {
        ids.push(state.engine.ingest(doc)?);
    }
    tracing::info!(count = ids.len(), "batch ingested");
    Ok(Json(serde_json::json!({ "ids": ids })))
}

async fn index_commit(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let Some(dir) = state.snapshot_dir.clone() else {
        return Err(ApiError::Status(StatusCode::CONFLICT, "no data directory configured".into()));
    };
    let engine = Arc::clone(&state.engine);
    let documents = tokio::task::spawn_blocking(move || {
        engine.save_snapshot(&SnapshotPaths::new(&dir)).map(|_| engine.len())
    })
    .await
    .map_err(|e| ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;
    Ok(Json(serde_json::json!({ "status": "committed", "documents": documents })))
}
