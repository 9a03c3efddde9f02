//! Persistence layer: stations, availability samples, and predictions.
//!
//! [`PersistenceGateway`] is the storage contract the orchestrator relies
//! on. Every operation is atomic per call and safe to invoke concurrently;
//! bulk writes run in their own transaction. [`PostgresStore`] is the
//! production implementation, [`InMemoryStore`] backs
//! `PERSISTENCE_ENABLED=false` and the tests.

pub mod memory;
pub mod postgres;

use std::fmt;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;

use crate::domain::{AvailabilityRecord, CombinedStationView, PredictionRecord, StationRecord};

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Storage failure for one persistence operation.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The database rejected or failed the operation.
    #[error("{operation}: {source}")]
    Database {
        /// Operation that failed (e.g. `"upsert stations"`).
        operation: &'static str,
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },

    /// The store could not be reached in time or refused the call.
    #[error("{operation}: {message}")]
    Unavailable {
        /// Operation that failed.
        operation: &'static str,
        /// Human-readable cause.
        message: String,
    },
}

/// Storage contract consumed by the services and the API.
pub trait PersistenceGateway: fmt::Debug + Send + Sync {
    /// Inserts or updates stations keyed by `station_id` (last write wins).
    fn upsert_stations<'a>(
        &'a self,
        stations: &'a [StationRecord],
    ) -> BoxFuture<'a, Result<(), PersistenceError>>;

    /// Appends availability samples.
    fn insert_availabilities<'a>(
        &'a self,
        availabilities: &'a [AvailabilityRecord],
    ) -> BoxFuture<'a, Result<(), PersistenceError>>;

    /// Appends predictions.
    fn insert_predictions<'a>(
        &'a self,
        predictions: &'a [PredictionRecord],
    ) -> BoxFuture<'a, Result<(), PersistenceError>>;

    /// Every station joined with its most recent availability sample,
    /// ordered by station name.
    fn get_stations_with_availability(
        &self,
    ) -> BoxFuture<'_, Result<Vec<CombinedStationView>, PersistenceError>>;

    /// The most recently created prediction of every station.
    fn get_latest_predictions(&self) -> BoxFuture<'_, Result<Vec<PredictionRecord>, PersistenceError>>;

    /// Availability samples recorded strictly after `since`, oldest first.
    fn get_availability_since(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<AvailabilityRecord>, PersistenceError>>;

    /// Verifies the store is reachable.
    fn health_check(&self) -> BoxFuture<'_, Result<(), PersistenceError>>;
}
