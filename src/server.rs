//! JSON HTTP server.
//!
//! A thin adapter over the import orchestrator, the quality pipeline, and the
//! retry worker. Contains no pipeline logic of its own. The retry worker is
//! started alongside the listener and stopped on shutdown.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/pipeline/preview` | Chunk and score a document, persisting nothing |
//! | `POST` | `/operations` | Import a document and deliver its posts |
//! | `GET`  | `/operations/{id}` | Operation record with its posts |
//! | `GET`  | `/status` | Queue counts, health window, worker state |
//! | `POST` | `/retry/trigger` | Run one retry tick now |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "operation not found: 42" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};

use postline_core::models::{Operation, Post};

use crate::config::Config;
use crate::context::AppContext;
use crate::import::{preview, run_import, ChunkPreview, ClientNotFound, ImportReport, ImportRequest};
use crate::source::DocumentSource;
use crate::status::{status_report, StatusReport};
use crate::worker::{RetryWorker, TickReport, WorkerConfig, WorkerStatus};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    ctx: AppContext,
    worker: RetryWorker,
    window_hours: i64,
}

/// Starts the HTTP server and the retry worker.
///
/// Binds to `[server].bind` and runs until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ctx = AppContext::from_config(config).await?;
    let worker = RetryWorker::new(ctx.clone(), WorkerConfig::from_retry_config(&config.retry));
    worker.start();

    let state = AppState {
        ctx,
        worker: worker.clone(),
        window_hours: config.health.window_hours,
    };
    let app = router(state);

    let bind_addr = &config.server.bind;
    println!("Postline server listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    worker.stop();
    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/pipeline/preview", post(handle_preview))
        .route("/operations", post(handle_create_operation))
        .route("/operations/{id}", get(handle_get_operation))
        .route("/status", get(handle_status))
        .route("/retry/trigger", post(handle_retry_trigger))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if let ApiError::Internal(e) = &self {
            tracing::error!(error = %e, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

fn import_error(e: anyhow::Error) -> ApiError {
    match e.downcast::<ClientNotFound>() {
        Ok(missing) => ApiError::NotFound(missing.to_string()),
        Err(e) => ApiError::Internal(e),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /pipeline/preview ============

#[derive(Deserialize)]
struct PreviewRequest {
    text: String,
}

#[derive(Serialize)]
struct PreviewResponse {
    chunks: Vec<ChunkPreview>,
}

async fn handle_preview(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }
    Ok(Json(PreviewResponse {
        chunks: preview(&req.text, &state.ctx.pipeline),
    }))
}

// ============ POST /operations ============

#[derive(Deserialize)]
struct CreateOperationRequest {
    client_id: String,
    source: DocumentSource,
    #[serde(default)]
    publish_at: Option<DateTime<Utc>>,
}

async fn handle_create_operation(
    State(state): State<AppState>,
    Json(req): Json<CreateOperationRequest>,
) -> Result<(StatusCode, Json<ImportReport>), ApiError> {
    let request = ImportRequest {
        client_id: req.client_id,
        source: req.source,
        scheduled_for: req.publish_at,
    };
    let report = run_import(&state.ctx, &request)
        .await
        .map_err(import_error)?;
    Ok((StatusCode::CREATED, Json(report)))
}

// ============ GET /operations/{id} ============

#[derive(Serialize)]
struct OperationResponse {
    operation: Operation,
    posts: Vec<Post>,
}

async fn handle_get_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OperationResponse>, ApiError> {
    let operation = state
        .ctx
        .store
        .get_operation(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("operation not found: {}", id)))?;
    let posts = state.ctx.store.list_posts(&id).await?;
    Ok(Json(OperationResponse { operation, posts }))
}

// ============ GET /status ============

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    report: StatusReport,
    worker: WorkerStatus,
}

async fn handle_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    Ok(Json(StatusResponse {
        report: status_report(&state.ctx, state.window_hours).await?,
        worker: state.worker.status().await?,
    }))
}

// ============ POST /retry/trigger ============

#[derive(Serialize)]
struct TriggerResponse {
    /// `false` when a tick was already in flight and this one was skipped.
    triggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<TickReport>,
}

async fn handle_retry_trigger(
    State(state): State<AppState>,
) -> Result<Json<TriggerResponse>, ApiError> {
    let report = state.worker.trigger_now().await?;
    Ok(Json(TriggerResponse {
        triggered: report.is_some(),
        report,
    }))
}
