//! Manual triggers: run a collection or prediction cycle on demand, and
//! the prediction service status passthrough.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::TriggerResponse;
use crate::app_state::AppState;
use crate::domain::RunId;
use crate::error::{ApiError, ErrorResponse};
use crate::scheduler::{self, Trigger};

/// `POST /api/refresh`: Run one collection cycle now.
///
/// # Errors
///
/// Returns [`ApiError::Refresh`] if any stage of the cycle fails.
#[utoipa::path(
    post,
    path = "/api/refresh",
    tag = "Triggers",
    summary = "Refresh station data",
    description = "Fetches both feeds, upserts stations and appends availability samples. Runs synchronously.",
    responses(
        (status = 200, description = "Cycle completed", body = TriggerResponse),
        (status = 500, description = "Cycle failed", body = ErrorResponse),
    )
)]
pub async fn refresh(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let run_id = RunId::new();
    let summary = scheduler::collect(&state.stations, run_id, Trigger::Manual).await?;

    Ok(Json(TriggerResponse {
        message: format!(
            "Station data refreshed: {} stations, {} availability samples",
            summary.stations, summary.availabilities
        ),
        run_id,
    }))
}

/// `POST /api/inference`: Run one prediction cycle now.
///
/// # Errors
///
/// Returns [`ApiError::Inference`] if the prediction service fails,
/// breaks its contract, or the predictions cannot be stored.
#[utoipa::path(
    post,
    path = "/api/inference",
    tag = "Triggers",
    summary = "Trigger inference",
    description = "Requests a prediction batch and stores it. Runs synchronously; a success also marks predictions as ready.",
    responses(
        (status = 200, description = "Inference completed", body = TriggerResponse),
        (status = 500, description = "Inference failed", body = ErrorResponse),
    )
)]
pub async fn inference(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let run_id = RunId::new();
    let summary =
        scheduler::predict(&state.inference, &state.scheduler, run_id, Trigger::Manual).await?;

    Ok(Json(TriggerResponse {
        message: format!("Inference completed: {} predictions", summary.predictions),
        run_id,
    }))
}

/// `GET /api/inference/status`: Prediction service status document.
///
/// # Errors
///
/// Returns [`ApiError::PredictionService`] if the service cannot be
/// reached or answers with an error.
#[utoipa::path(
    get,
    path = "/api/inference/status",
    tag = "Triggers",
    summary = "Prediction service status",
    description = "Passes through the prediction service's own status document.",
    responses(
        (status = 200, description = "Status document as returned by the service"),
        (status = 500, description = "Service unreachable", body = ErrorResponse),
    )
)]
pub async fn inference_status(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.prediction_gateway.get_status().await?;
    Ok(Json(status))
}

/// Trigger routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/refresh", post(refresh))
        .route("/inference", post(inference))
        .route("/inference/status", get(inference_status))
}
