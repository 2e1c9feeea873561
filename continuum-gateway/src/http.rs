/**
 * API REST GATEWAY - Surface HTTP du rôle passerelle
 *
 * ROUTES :
 * - POST /api/v1/metrics                   ingestion d'un payload producteur
 * - GET  /api/v1/agents                    agents actifs groupés par type
 * - GET  /api/v1/agent/{agent_id}/history  historique récent (limit=10 par défaut)
 * - GET  /health                           joignabilité store + processor
 * - GET  /metrics                          métriques Prometheus de la passerelle
 *
 * ERREURS : `{"detail": "..."}` avec un statut 5xx ; un panic dans un handler est
 * converti en 500 par CatchPanicLayer.
 */

use crate::health::{GatewayHealth, HealthTracker};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use continuum_core::{AcceptAck, Gateway, GatewayError, KeyedStore, MetricPayload, ProcessorClient};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

pub const DEFAULT_HISTORY_PAGE: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub store: Arc<dyn KeyedStore>,
    pub processor: Arc<dyn ProcessorClient>,
    pub health_tracker: HealthTracker,
}

/// Erreur HTTP au format `{"detail": ...}`.
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "detail": self.1 }))).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        error!("Error processing metrics: {err}");
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentsView {
    pub active_agents: BTreeMap<String, BTreeSet<String>>,
    pub total_count: usize,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryView {
    pub agent_id: String,
    pub history: Vec<MetricPayload>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .route("/api/v1/metrics", post(receive_metrics))
        .route("/api/v1/agents", get(list_agents))
        .route("/api/v1/agent/{agent_id}/history", get(get_agent_history))
        .with_state(app_state)
        .layer(CatchPanicLayer::new())
}

// POST /api/v1/metrics
async fn receive_metrics(
    State(app): State<AppState>,
    Json(payload): Json<MetricPayload>,
) -> Result<Json<AcceptAck>, ApiError> {
    Ok(Json(app.gateway.accept(payload).await?))
}

// GET /api/v1/agents
async fn list_agents(State(app): State<AppState>) -> Result<Json<AgentsView>, ApiError> {
    let active_agents = app.gateway.active_agents().await?;
    let total_count = active_agents.values().map(BTreeSet::len).sum();
    Ok(Json(AgentsView {
        active_agents,
        total_count,
        timestamp: continuum_core::now_iso(),
    }))
}

// GET /api/v1/agent/{agent_id}/history?limit=N
async fn get_agent_history(
    State(app): State<AppState>,
    Path(agent_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryView>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_PAGE);
    let history = app.gateway.history(&agent_id, limit).await?;
    Ok(Json(HistoryView {
        agent_id,
        count: history.len(),
        history,
    }))
}

// GET /health
async fn get_health(State(app): State<AppState>) -> Json<GatewayHealth> {
    Json(app.health_tracker.check(app.store.as_ref(), app.processor.as_ref()).await)
}

// GET /metrics
async fn get_metrics(State(app): State<AppState>) -> Result<Response, ApiError> {
    let body = app
        .gateway
        .metrics()
        .encode()
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}
