//! OpenAPI document for the REST API.

use utoipa::OpenApi;

use super::dto::{AvailabilityResponse, StationsResponse, TriggerResponse};
use super::handlers::system::{HealthResponse, LoopsStatus};
use super::handlers::{stations, system, triggers};
use crate::domain::{AvailabilityRecord, CombinedStationView, PredictionRecord, RunId, StationRecord};
use crate::error::{ErrorBody, ErrorResponse};
use crate::scheduler::{LoopState, Readiness};

/// Generated OpenAPI description of every route.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "bikeshare-orchestrator",
        description = "Station availability, predictions, and manual collection/inference triggers."
    ),
    paths(
        stations::stations_json,
        stations::recent_availability,
        triggers::refresh,
        triggers::inference,
        triggers::inference_status,
        system::health_handler,
        system::metrics_handler,
    ),
    components(schemas(
        StationRecord,
        AvailabilityRecord,
        CombinedStationView,
        PredictionRecord,
        RunId,
        StationsResponse,
        AvailabilityResponse,
        TriggerResponse,
        HealthResponse,
        LoopsStatus,
        LoopState,
        Readiness,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Stations", description = "Station and availability reads"),
        (name = "Triggers", description = "On-demand collection and inference"),
        (name = "System", description = "Health and metrics"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/stations/json",
            "/api/availability",
            "/api/refresh",
            "/api/inference",
            "/api/inference/status",
            "/health",
            "/metrics",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
