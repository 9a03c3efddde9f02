//! Service layer: the two use cases the scheduler and the API drive.
//!
//! [`StationService`] runs a collection cycle (feeds into the store) and
//! [`InferenceService`] runs a prediction cycle (model into the store).

pub mod inference_service;
pub mod station_service;

pub use inference_service::{InferenceError, InferenceService, InferenceSummary};
pub use station_service::{RefreshError, RefreshSummary, StationService};
