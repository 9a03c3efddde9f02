//! Inference service: one prediction run from the model into the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::PredictionRecord;
use crate::inference::{PredictionError, PredictionGateway, RawPrediction};
use crate::persistence::{PersistenceError, PersistenceGateway};

/// A failed prediction run, tagged with the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// The prediction service failed or broke its contract.
    #[error("get predictions: {0}")]
    Predict(#[source] PredictionError),

    /// Storing the converted batch failed.
    #[error("store predictions: {0}")]
    StorePredictions(#[source] PersistenceError),
}

impl InferenceError {
    /// Short name of the failing stage, for logs.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Predict(_) => "predict",
            Self::StorePredictions(_) => "store_predictions",
        }
    }
}

/// Outcome of one successful prediction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceSummary {
    /// Predictions stored.
    pub predictions: usize,
    /// Predictions whose target time could not be parsed and was replaced
    /// by the run time.
    pub substituted_times: usize,
}

/// Runs prediction cycles: request a batch, convert it, store it.
#[derive(Debug, Clone)]
pub struct InferenceService {
    gateway: Arc<dyn PredictionGateway>,
    store: Arc<dyn PersistenceGateway>,
}

impl InferenceService {
    /// Creates a new `InferenceService`.
    #[must_use]
    pub fn new(gateway: Arc<dyn PredictionGateway>, store: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway, store }
    }

    /// Requests predictions for every station and stores them in one call.
    ///
    /// A prediction whose `prediction_time` does not parse is kept, stamped
    /// with the current time. Nothing is retried here.
    ///
    /// # Errors
    ///
    /// Returns an [`InferenceError`] if the batch cannot be obtained or
    /// stored.
    pub async fn run_inference_with_results(&self) -> Result<InferenceSummary, InferenceError> {
        let batch = self
            .gateway
            .get_predictions()
            .await
            .map_err(InferenceError::Predict)?;

        let now = Utc::now();
        let mut substituted_times = 0;
        let records: Vec<PredictionRecord> = batch
            .predictions
            .iter()
            .map(|raw| {
                let (record, substituted) = to_prediction_record(raw, now);
                if substituted {
                    substituted_times += 1;
                }
                record
            })
            .collect();

        self.store
            .insert_predictions(&records)
            .await
            .map_err(InferenceError::StorePredictions)?;

        tracing::info!(
            predictions = records.len(),
            substituted_times,
            cached = batch.cached,
            "predictions stored"
        );

        Ok(InferenceSummary {
            predictions: records.len(),
            substituted_times,
        })
    }
}

/// Converts one raw prediction. The flag is `true` when the target time
/// was unparsable and `now` was used instead.
fn to_prediction_record(raw: &RawPrediction, now: DateTime<Utc>) -> (PredictionRecord, bool) {
    let (prediction_time, substituted) = match DateTime::parse_from_rfc3339(&raw.prediction_time) {
        Ok(t) => (t.with_timezone(&Utc), false),
        Err(e) => {
            tracing::warn!(
                station_id = %raw.station_id,
                value = %raw.prediction_time,
                error = %e,
                "unparsable prediction time, using current time"
            );
            (now, true)
        }
    };

    let record = PredictionRecord {
        id: None,
        station_id: raw.station_id.clone(),
        predicted_availability_class: raw.predicted_availability_class,
        availability_prediction: raw.availability_prediction.clone(),
        prediction_time,
        horizon_hours: raw.horizon_hours,
        created_at: None,
    };
    (record, substituted)
}
