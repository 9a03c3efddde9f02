//! Station read handlers: current/predicted view and recent availability.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};

use crate::api::dto::{
    AvailabilityQuery, AvailabilityResponse, StationsMode, StationsQuery, StationsResponse,
};
use crate::app_state::AppState;
use crate::error::{ApiError, ErrorResponse};

/// Window used by `GET /api/availability` when `since` is omitted.
const RECENT_WINDOW_MINUTES: i64 = 20;

/// `GET /api/stations/json`: Stations with their latest availability.
///
/// # Errors
///
/// Returns [`ApiError`] on an unknown mode, a store failure, or, in
/// `predicted` mode, when no predictions are stored yet.
#[utoipa::path(
    get,
    path = "/api/stations/json",
    tag = "Stations",
    summary = "Current or predicted station availability",
    description = "Returns every station joined with its most recent availability sample. With `mode=predicted` the latest prediction of every station is included, or 503 if none exist yet.",
    params(StationsQuery),
    responses(
        (status = 200, description = "Station view", body = StationsResponse),
        (status = 400, description = "Unknown mode", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
        (status = 503, description = "Predictions not ready", body = ErrorResponse),
    )
)]
pub async fn stations_json(
    State(state): State<AppState>,
    Query(query): Query<StationsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = query
        .mode()
        .map_err(|m| ApiError::InvalidRequest(format!("unknown mode {m:?}, expected current or predicted")))?;

    let stations = state.store.get_stations_with_availability().await?;

    let predictions = match mode {
        StationsMode::Current => None,
        StationsMode::Predicted => {
            let predictions = state.store.get_latest_predictions().await?;
            if predictions.is_empty() {
                return Err(ApiError::PredictionsUnavailable);
            }
            Some(predictions)
        }
    };

    Ok(Json(StationsResponse {
        stations,
        predictions,
    }))
}

/// `GET /api/availability`: Availability samples recorded recently.
///
/// # Errors
///
/// Returns [`ApiError`] if `since` is not RFC 3339 or the store fails.
#[utoipa::path(
    get,
    path = "/api/availability",
    tag = "Stations",
    summary = "Recent availability samples",
    description = "Returns every availability sample recorded after `since` (default: the last 20 minutes), oldest first.",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Availability samples", body = AvailabilityResponse),
        (status = 400, description = "Malformed `since`", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn recent_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let since = match query.since.as_deref() {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| ApiError::InvalidRequest(format!("since: {e}")))?,
        None => Utc::now() - Duration::minutes(RECENT_WINDOW_MINUTES),
    };

    let availability = state.store.get_availability_since(since).await?;
    Ok(Json(AvailabilityResponse {
        since,
        availability,
    }))
}

/// Station read routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stations/json", get(stations_json))
        .route("/availability", get(recent_availability))
}
