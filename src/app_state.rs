//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::inference::PredictionGateway;
use crate::metrics::MetricsHandle;
use crate::persistence::PersistenceGateway;
use crate::scheduler::SchedulerStatus;
use crate::service::{InferenceService, StationService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Store the read endpoints query.
    pub store: Arc<dyn PersistenceGateway>,
    /// Collection use case, for manual refreshes.
    pub stations: Arc<StationService>,
    /// Prediction use case, for manual inference runs.
    pub inference: Arc<InferenceService>,
    /// Prediction service client, for the status passthrough.
    pub prediction_gateway: Arc<dyn PredictionGateway>,
    /// Loop states and prediction readiness.
    pub scheduler: SchedulerStatus,
    /// Prometheus exposition for `GET /metrics`.
    pub metrics: MetricsHandle,
}
