/**
 * API REST PROCESSOR - Surface HTTP du rôle processor
 *
 * ROUTES :
 * - POST /api/v1/process   validate -> normalize -> enrich -> export
 * - GET  /api/v1/stats     version du pipeline
 * - GET  /health           statique
 * - GET  /metrics          compteurs Prometheus du processor
 *
 * STATUTS : 400 payload invalide, 500 échec d'export (ou panic attrapé), 200 sinon.
 */

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use continuum_core::{MetricPayload, ProcessError, ProcessedAck, Processor};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<Processor>,
}

pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "detail": self.1 }))).into_response()
    }
}

impl From<ProcessError> for ApiError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Invalid(_) => ApiError(StatusCode::BAD_REQUEST, err.to_string()),
            ProcessError::Export(_) => {
                error!("Processing error: {err}");
                ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/api/v1/process", post(process_metrics))
        .route("/api/v1/stats", get(get_stats))
        .with_state(app_state)
        .layer(CatchPanicLayer::new())
}

// POST /api/v1/process
async fn process_metrics(
    State(app): State<AppState>,
    Json(payload): Json<MetricPayload>,
) -> Result<Json<ProcessedAck>, ApiError> {
    Ok(Json(app.processor.process(&payload).await?))
}

// GET /health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": continuum_core::now_iso(),
    }))
}

// GET /api/v1/stats
async fn get_stats(State(app): State<AppState>) -> Json<Value> {
    Json(json!({
        "pipeline_version": app.processor.pipeline_version(),
        "status": "running",
        "timestamp": continuum_core::now_iso(),
    }))
}

// GET /metrics
async fn get_metrics(State(app): State<AppState>) -> Result<Response, ApiError> {
    let body = app
        .processor
        .metrics()
        .encode()
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}
