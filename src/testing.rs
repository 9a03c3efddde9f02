//! In-process fakes of the collaborator traits for unit tests.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::{AvailabilityRecord, CombinedStationView, PredictionRecord, StationRecord};
use crate::feed::{FeedError, FeedSnapshot, FeedSource, StationSource, StatusSource};
use crate::inference::{
    PredictionBatch, PredictionError, PredictionGateway, RawPrediction, ServiceStatus,
};
use crate::persistence::{InMemoryStore, PersistenceError, PersistenceGateway};

pub(crate) fn station_source(id: &str, name: &str) -> StationSource {
    StationSource {
        station_id: id.to_string(),
        name: name.to_string(),
        lat: 41.88,
        lon: -87.63,
        capacity: 15,
    }
}

pub(crate) fn status_source(id: &str, bikes: i32, docks: i32) -> StatusSource {
    StatusSource {
        station_id: id.to_string(),
        num_bikes_available: bikes,
        num_docks_available: docks,
        is_installed: 1,
        is_renting: 1,
        is_returning: 1,
        last_reported: 1_672_574_400,
    }
}

pub(crate) fn raw_prediction(station_id: &str, prediction_time: &str) -> RawPrediction {
    RawPrediction {
        station_id: station_id.to_string(),
        predicted_availability_class: 1,
        prediction_time: prediction_time.to_string(),
        horizon_hours: 6,
        availability_prediction: "yellow".to_string(),
    }
}

pub(crate) fn batch(predictions: Vec<RawPrediction>, count: usize) -> PredictionBatch {
    PredictionBatch {
        predictions,
        count,
        timestamp: "2023-01-01T12:00:00Z".to_string(),
        cached: false,
    }
}

/// Feed that returns a fixed snapshot, or a 503 when built with
/// [`StubFeed::failing`], and remembers when it was called.
#[derive(Debug)]
pub(crate) struct StubFeed {
    snapshot: Option<FeedSnapshot>,
    hang: bool,
    calls: Mutex<Vec<Instant>>,
}

impl StubFeed {
    pub(crate) fn new(snapshot: FeedSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            hang: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            snapshot: None,
            hang: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Never answers.
    pub(crate) fn hanging() -> Self {
        Self {
            snapshot: None,
            hang: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn calls(&self) -> Vec<Instant> {
        self.calls.lock().await.clone()
    }
}

impl FeedSource for StubFeed {
    fn fetch(&self) -> BoxFuture<'_, Result<FeedSnapshot, FeedError>> {
        async move {
            self.calls.lock().await.push(Instant::now());
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.snapshot.clone().ok_or_else(|| FeedError::Status {
                url: "http://feeds.test/station_status.json".to_string(),
                status: 503,
            })
        }
        .boxed()
    }
}

/// One scripted answer of [`StubPredictionGateway`].
#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Batch(PredictionBatch),
    Unavailable,
    /// The request never completes.
    Hang,
}

/// Prediction gateway replaying a script of answers. Once the script is
/// exhausted the fallback answer repeats. Batches go through the same
/// contract check as the real client.
#[derive(Debug)]
pub(crate) struct StubPredictionGateway {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    calls: Mutex<Vec<Instant>>,
}

impl StubPredictionGateway {
    pub(crate) fn new(script: Vec<Scripted>, fallback: Scripted) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn always(answer: Scripted) -> Self {
        Self::new(Vec::new(), answer)
    }

    pub(crate) async fn calls(&self) -> Vec<Instant> {
        self.calls.lock().await.clone()
    }

    async fn next(&self) -> Result<PredictionBatch, PredictionError> {
        self.calls.lock().await.push(Instant::now());
        let answer = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match answer {
            Scripted::Batch(batch) => {
                batch.validate()?;
                Ok(batch)
            }
            Scripted::Unavailable => Err(PredictionError::Status {
                status: 503,
                body: "model loading".to_string(),
            }),
            Scripted::Hang => std::future::pending().await,
        }
    }
}

impl PredictionGateway for StubPredictionGateway {
    fn get_predictions(&self) -> BoxFuture<'_, Result<PredictionBatch, PredictionError>> {
        self.next().boxed()
    }

    fn get_status(&self) -> BoxFuture<'_, Result<ServiceStatus, PredictionError>> {
        async {
            let mut status = ServiceStatus::new();
            status.insert("status".to_string(), "ready".into());
            Ok(status)
        }
        .boxed()
    }
}

/// Every write a [`RecordingStore`] received, in order.
#[derive(Debug, Default, Clone)]
pub(crate) struct Recorded {
    pub(crate) upserts: Vec<Vec<StationRecord>>,
    pub(crate) availability_inserts: Vec<Vec<AvailabilityRecord>>,
    pub(crate) prediction_inserts: Vec<Vec<PredictionRecord>>,
}

impl Recorded {
    pub(crate) fn write_count(&self) -> usize {
        self.upserts.len() + self.availability_inserts.len() + self.prediction_inserts.len()
    }
}

/// Store that records every write call and can be told to fail one
/// operation. Reads and successful writes go to an [`InMemoryStore`].
#[derive(Debug, Default)]
pub(crate) struct RecordingStore {
    inner: InMemoryStore,
    recorded: Mutex<Recorded>,
    fail_on: Option<&'static str>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails every call of the named operation.
    pub(crate) fn failing(operation: &'static str) -> Self {
        Self {
            fail_on: Some(operation),
            ..Self::default()
        }
    }

    pub(crate) async fn recorded(&self) -> Recorded {
        self.recorded.lock().await.clone()
    }

    fn check(&self, operation: &'static str) -> Result<(), PersistenceError> {
        if self.fail_on == Some(operation) {
            return Err(PersistenceError::Unavailable {
                operation,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl PersistenceGateway for RecordingStore {
    fn upsert_stations<'a>(
        &'a self,
        stations: &'a [StationRecord],
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        async move {
            self.recorded.lock().await.upserts.push(stations.to_vec());
            self.check("upsert stations")?;
            self.inner.upsert_stations(stations).await
        }
        .boxed()
    }

    fn insert_availabilities<'a>(
        &'a self,
        availabilities: &'a [AvailabilityRecord],
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        async move {
            self.recorded
                .lock()
                .await
                .availability_inserts
                .push(availabilities.to_vec());
            self.check("insert availabilities")?;
            self.inner.insert_availabilities(availabilities).await
        }
        .boxed()
    }

    fn insert_predictions<'a>(
        &'a self,
        predictions: &'a [PredictionRecord],
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        async move {
            self.recorded
                .lock()
                .await
                .prediction_inserts
                .push(predictions.to_vec());
            self.check("insert predictions")?;
            self.inner.insert_predictions(predictions).await
        }
        .boxed()
    }

    fn get_stations_with_availability(
        &self,
    ) -> BoxFuture<'_, Result<Vec<CombinedStationView>, PersistenceError>> {
        self.inner.get_stations_with_availability()
    }

    fn get_latest_predictions(&self) -> BoxFuture<'_, Result<Vec<PredictionRecord>, PersistenceError>> {
        self.inner.get_latest_predictions()
    }

    fn get_availability_since(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<AvailabilityRecord>, PersistenceError>> {
        self.inner.get_availability_since(since)
    }

    fn health_check(&self) -> BoxFuture<'_, Result<(), PersistenceError>> {
        async move { self.check("health check") }.boxed()
    }
}

