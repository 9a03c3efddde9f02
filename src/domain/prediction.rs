//! Stored availability predictions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One prediction for one station, as persisted.
///
/// Append-only. The "latest" prediction of a station is the one with the
/// most recent `created_at`; older rows are never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PredictionRecord {
    /// Store-assigned row id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Station the prediction is for.
    pub station_id: String,
    /// Discrete availability class produced by the model.
    pub predicted_availability_class: i32,
    /// Categorical label for the class (e.g. `"green"`).
    pub availability_prediction: String,
    /// The future instant the prediction targets.
    pub prediction_time: DateTime<Utc>,
    /// How many hours ahead of generation the prediction looks.
    pub horizon_hours: i32,
    /// Store-assigned creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
