//! System endpoints: health check and Prometheus metrics.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::scheduler::{LoopState, Readiness};

/// Name reported in the health body.
const SERVICE_NAME: &str = "bikeshare-orchestrator";

/// State of both background loops.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoopsStatus {
    /// Collection loop.
    pub collection: LoopState,
    /// Prediction loop.
    pub prediction: LoopState,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Number of stations with a stored prediction.
    pub predictions_count: usize,
    /// `ok` or `unreachable`.
    pub database: &'static str,
    /// Outcome of the initial wait for the prediction service.
    pub initial_inference: Readiness,
    /// Background loop states.
    pub loops: LoopsStatus,
    /// Why the service is unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `GET /health`: Service health status.
///
/// Healthy only when the store answers and holds at least one prediction.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Reports the number of stored predictions, database reachability, the initial inference outcome and the loop states. Returns 503 until at least one prediction is stored.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "No predictions yet or database unreachable", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (database, db_reason) = match state.store.health_check().await {
        Ok(()) => ("ok", None),
        Err(e) => {
            tracing::warn!(error = %e, "database health check failed");
            ("unreachable", Some(format!("database unreachable: {e}")))
        }
    };

    let (predictions_count, predictions_reason) = match state.store.get_latest_predictions().await {
        Ok(p) if p.is_empty() => (0, Some("predictions not available".to_string())),
        Ok(p) => (p.len(), None),
        Err(e) => (0, Some(format!("predictions not available: {e}"))),
    };

    let reason = db_reason.or(predictions_reason);
    let (code, status) = if reason.is_none() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        code,
        Json(HealthResponse {
            status,
            service: SERVICE_NAME,
            predictions_count,
            database,
            initial_inference: state.scheduler.readiness(),
            loops: LoopsStatus {
                collection: state.scheduler.collection(),
                prediction: state.scheduler.prediction(),
            },
            reason,
        }),
    )
}

/// `GET /metrics`: Prometheus text exposition.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "System",
    summary = "Prometheus metrics",
    description = "Cycle counters by trigger and outcome, cycle durations, and skipped feed records.",
    responses(
        (status = 200, description = "Metrics in the Prometheus text format", body = String, content_type = "text/plain"),
    )
)]
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// System routes mounted at the root level (not under /api).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
}
