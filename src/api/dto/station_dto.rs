//! Station and availability DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{AvailabilityRecord, CombinedStationView, PredictionRecord};

/// Query parameters for `GET /api/stations/json`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StationsQuery {
    /// `current` (default) or `predicted`.
    #[serde(default)]
    pub mode: Option<String>,
}

/// Which view of the stations to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationsMode {
    /// Latest availability only.
    Current,
    /// Latest availability plus the latest prediction of every station.
    Predicted,
}

impl StationsQuery {
    /// Parses `mode`, defaulting to [`StationsMode::Current`].
    ///
    /// # Errors
    ///
    /// Returns the unrecognised value.
    pub fn mode(&self) -> Result<StationsMode, String> {
        match self.mode.as_deref().map(str::trim) {
            None | Some("" | "current") => Ok(StationsMode::Current),
            Some("predicted") => Ok(StationsMode::Predicted),
            Some(other) => Err(other.to_string()),
        }
    }
}

/// Response body for `GET /api/stations/json`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StationsResponse {
    /// Every station with its latest availability, ordered by name.
    pub stations: Vec<CombinedStationView>,
    /// Latest prediction per station; present in `predicted` mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictions: Option<Vec<PredictionRecord>>,
}

/// Query parameters for `GET /api/availability`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    /// RFC 3339 lower bound (exclusive). Defaults to 20 minutes ago.
    #[serde(default)]
    pub since: Option<String>,
}

/// Response body for `GET /api/availability`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AvailabilityResponse {
    /// Lower bound that was applied.
    pub since: DateTime<Utc>,
    /// Samples recorded after `since`, oldest first.
    pub availability: Vec<AvailabilityRecord>,
}
