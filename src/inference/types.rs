//! Wire types for the prediction service and the batch contract check.

use serde::{Deserialize, Serialize};

/// A single raw prediction as returned by `POST /predict`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawPrediction {
    /// Station the prediction is for.
    #[serde(default)]
    pub station_id: String,
    /// Discrete availability class.
    pub predicted_availability_class: i32,
    /// Target instant as an RFC 3339 string; parsed later, leniently.
    #[serde(default)]
    pub prediction_time: String,
    /// Prediction horizon in hours.
    pub horizon_hours: i32,
    /// Categorical label for the class.
    #[serde(default)]
    pub availability_prediction: String,
}

/// A full `POST /predict` response.
///
/// Decoding only checks the shape; call [`PredictionBatch::validate`] before
/// trusting the contents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PredictionBatch {
    /// Predictions, one per station and horizon.
    pub predictions: Vec<RawPrediction>,
    /// Count declared by the service.
    pub count: usize,
    /// Generation time reported by the service.
    #[serde(default)]
    pub timestamp: String,
    /// Whether the service answered from its own cache.
    #[serde(default)]
    pub cached: bool,
}

/// A prediction batch that breaks the response contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    /// The batch carries no predictions.
    #[error("no predictions in response")]
    EmptyBatch,

    /// `count` disagrees with the number of predictions.
    #[error("prediction count mismatch: declared {declared}, received {actual}")]
    CountMismatch {
        /// Value of the `count` field.
        declared: usize,
        /// Length of the `predictions` list.
        actual: usize,
    },

    /// An element has an empty `station_id`.
    #[error("prediction {index} missing station ID")]
    MissingStationId {
        /// Position in the list.
        index: usize,
    },

    /// An element has an empty `prediction_time`.
    #[error("prediction {index} missing prediction time")]
    MissingPredictionTime {
        /// Position in the list.
        index: usize,
    },
}

impl PredictionBatch {
    /// Checks the batch against the response contract.
    ///
    /// Violations are reported, never repaired.
    ///
    /// # Errors
    ///
    /// Returns the first [`ContractViolation`] found.
    pub fn validate(&self) -> Result<(), ContractViolation> {
        if self.predictions.is_empty() {
            return Err(ContractViolation::EmptyBatch);
        }
        if self.count != self.predictions.len() {
            return Err(ContractViolation::CountMismatch {
                declared: self.count,
                actual: self.predictions.len(),
            });
        }
        for (index, prediction) in self.predictions.iter().enumerate() {
            if prediction.station_id.is_empty() {
                return Err(ContractViolation::MissingStationId { index });
            }
            if prediction.prediction_time.is_empty() {
                return Err(ContractViolation::MissingPredictionTime { index });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn raw(station_id: &str, prediction_time: &str) -> RawPrediction {
        RawPrediction {
            station_id: station_id.to_string(),
            predicted_availability_class: 1,
            prediction_time: prediction_time.to_string(),
            horizon_hours: 6,
            availability_prediction: "green".to_string(),
        }
    }

    fn batch(predictions: Vec<RawPrediction>, count: usize) -> PredictionBatch {
        PredictionBatch {
            predictions,
            count,
            timestamp: "2023-01-01T12:00:00Z".to_string(),
            cached: false,
        }
    }

    #[test]
    fn valid_batch_passes() {
        let b = batch(vec![raw("123", "2023-01-01T12:00:00Z")], 1);
        assert_eq!(b.validate(), Ok(()));
    }

    #[test]
    fn empty_batch_rejected_even_when_count_matches() {
        assert_eq!(batch(vec![], 0).validate(), Err(ContractViolation::EmptyBatch));
    }

    #[test]
    fn count_mismatch_rejected() {
        let one = vec![raw("123", "2023-01-01T12:00:00Z")];
        for declared in [0, 2, 5, 100] {
            assert_eq!(
                batch(one.clone(), declared).validate(),
                Err(ContractViolation::CountMismatch {
                    declared,
                    actual: 1
                })
            );
        }
    }

    #[test]
    fn missing_fields_report_index() {
        let b = batch(
            vec![raw("1", "2023-01-01T12:00:00Z"), raw("", "2023-01-01T12:00:00Z")],
            2,
        );
        assert_eq!(b.validate(), Err(ContractViolation::MissingStationId { index: 1 }));

        let b = batch(vec![raw("1", "")], 1);
        assert_eq!(
            b.validate(),
            Err(ContractViolation::MissingPredictionTime { index: 0 })
        );
    }

    #[test]
    fn unparsable_time_is_not_a_contract_violation() {
        let b = batch(vec![raw("123", "not-a-time")], 1);
        assert_eq!(b.validate(), Ok(()));
    }

    #[test]
    fn missing_string_fields_decode_as_empty() {
        let body = r#"{"predictions":[{"predicted_availability_class":1,"horizon_hours":6}],"count":1}"#;
        let Ok(decoded) = serde_json::from_str::<PredictionBatch>(body) else {
            panic!("batch should decode");
        };
        assert_eq!(
            decoded.validate(),
            Err(ContractViolation::MissingStationId { index: 0 })
        );
    }
}
