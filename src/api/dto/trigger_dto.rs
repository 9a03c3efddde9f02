//! Responses of the manual trigger endpoints.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::RunId;

/// Response body for `POST /api/refresh` and `POST /api/inference`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TriggerResponse {
    /// Human-readable outcome.
    pub message: String,
    /// Identifier of the run, as found in the logs.
    pub run_id: RunId,
}
