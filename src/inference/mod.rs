//! External prediction service gateway.
//!
//! The model runs out of process. This module owns the wire contract with
//! it: `POST /predict` for a batch and `GET /status` for a readiness check.

mod client;
mod error;
mod types;

pub use client::{
    DEFAULT_BASE_URL, PredictionClient, PredictionConfig, PredictionGateway, ServiceStatus,
};
pub use error::PredictionError;
pub use types::{ContractViolation, PredictionBatch, RawPrediction};
