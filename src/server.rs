//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ocr/upload` | Run the pipeline on two image URLs and store the result |
//! | `GET`  | `/products/{name}` | Stored analysis for a product name |
//! | `GET`  | `/products?limit=N` | Most recently updated analyses |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "ingredient_image_url must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), and for failed
//! pipeline runs (500) one of `extraction_failed`, `analysis_failed`,
//! `persistence_failed`, `task_failed`. Store read failures are `internal`
//! (500).

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use nutrilens_core::models::{LabelImages, StoredAnalysis};

use crate::config::Config;
use crate::db;
use crate::error::PipelineError;
use crate::migrate;
use crate::pipeline::{Pipeline, PipelineOutcome};
use crate::sqlite_store::SqliteStore;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

/// Starts the HTTP server on `[server].bind` with the SQLite store and the
/// configured providers. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let pipeline = Pipeline::from_config(config, store)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("nutrilens listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(Arc::new(pipeline))).await?;

    Ok(())
}

/// Build the application router around a pipeline.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ocr/upload", post(handle_upload))
        .route("/products", get(handle_list_products))
        .route("/products/{name}", get(handle_get_product))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(pipeline)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: format!("{:#}", err),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ocr/upload ============

#[derive(Deserialize)]
struct UploadRequest {
    ingredient_image_url: String,
    nutrition_image_url: String,
}

async fn handle_upload(
    State(pipeline): State<Arc<Pipeline>>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<PipelineOutcome>, AppError> {
    let Json(req) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;

    if req.ingredient_image_url.trim().is_empty() {
        return Err(bad_request("ingredient_image_url must not be empty"));
    }
    if req.nutrition_image_url.trim().is_empty() {
        return Err(bad_request("nutrition_image_url must not be empty"));
    }

    let images = LabelImages::new(req.ingredient_image_url, req.nutrition_image_url);
    let outcome = pipeline.run(&images).await?;
    Ok(Json(outcome))
}

// ============ GET /products ============

#[derive(Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ListResponse {
    products: Vec<StoredAnalysis>,
}

async fn handle_list_products(
    State(pipeline): State<Arc<Pipeline>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let products = pipeline.store().list(limit).await.map_err(internal)?;
    Ok(Json(ListResponse { products }))
}

async fn handle_get_product(
    State(pipeline): State<Arc<Pipeline>>,
    Path(name): Path<String>,
) -> Result<Json<StoredAnalysis>, AppError> {
    match pipeline.store().get(&name).await.map_err(internal)? {
        Some(stored) => Ok(Json(stored)),
        None => Err(not_found(format!("no analysis stored for product '{}'", name))),
    }
}
