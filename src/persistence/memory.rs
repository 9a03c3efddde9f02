//! In-process store with the same semantics as [`super::PostgresStore`].
//!
//! All state sits behind one [`tokio::sync::RwLock`], so every call is
//! atomic: a bulk write either lands completely or not at all, and readers
//! never observe half of one.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::RwLock;

use super::{PersistenceError, PersistenceGateway};
use crate::domain::{AvailabilityRecord, CombinedStationView, PredictionRecord, StationRecord};

#[derive(Debug, Default)]
struct Tables {
    stations: BTreeMap<String, StationRecord>,
    availability: Vec<AvailabilityRecord>,
    predictions: Vec<PredictionRecord>,
    next_availability_id: i64,
    next_prediction_id: i64,
}

/// Volatile store for running without a database and for tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn upsert(&self, stations: &[StationRecord]) -> Result<(), PersistenceError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        for station in stations {
            tables
                .stations
                .entry(station.station_id.clone())
                .and_modify(|existing| {
                    existing.name.clone_from(&station.name);
                    existing.lat = station.lat;
                    existing.lon = station.lon;
                    existing.capacity = station.capacity;
                    existing.updated_at = Some(now);
                })
                .or_insert_with(|| StationRecord {
                    created_at: Some(now),
                    updated_at: Some(now),
                    ..station.clone()
                });
        }
        Ok(())
    }

    async fn append_availability(
        &self,
        availabilities: &[AvailabilityRecord],
    ) -> Result<(), PersistenceError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        for a in availabilities {
            tables.next_availability_id += 1;
            let id = tables.next_availability_id;
            tables.availability.push(AvailabilityRecord {
                id: Some(id),
                recorded_at: Some(now),
                ..a.clone()
            });
        }
        Ok(())
    }

    async fn append_predictions(
        &self,
        predictions: &[PredictionRecord],
    ) -> Result<(), PersistenceError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        for p in predictions {
            tables.next_prediction_id += 1;
            let id = tables.next_prediction_id;
            tables.predictions.push(PredictionRecord {
                id: Some(id),
                created_at: Some(now),
                ..p.clone()
            });
        }
        Ok(())
    }

    async fn combined(&self) -> Result<Vec<CombinedStationView>, PersistenceError> {
        let tables = self.tables.read().await;

        // rows are appended in recording order, so the last one wins
        let mut latest: HashMap<&str, &AvailabilityRecord> = HashMap::new();
        for a in &tables.availability {
            latest.insert(a.station_id.as_str(), a);
        }

        let mut views: Vec<CombinedStationView> = tables
            .stations
            .values()
            .map(|s| CombinedStationView::from_parts(s.clone(), latest.get(s.station_id.as_str()).copied()))
            .collect();
        views.sort_by(|a, b| a.station.name.cmp(&b.station.name));
        Ok(views)
    }

    async fn latest_predictions(&self) -> Result<Vec<PredictionRecord>, PersistenceError> {
        let tables = self.tables.read().await;
        let mut latest: BTreeMap<&str, &PredictionRecord> = BTreeMap::new();
        for p in &tables.predictions {
            latest.insert(p.station_id.as_str(), p);
        }
        Ok(latest.into_values().cloned().collect())
    }

    async fn since(&self, since: DateTime<Utc>) -> Result<Vec<AvailabilityRecord>, PersistenceError> {
        let tables = self.tables.read().await;
        Ok(tables
            .availability
            .iter()
            .filter(|a| a.recorded_at.is_some_and(|t| t > since))
            .cloned()
            .collect())
    }
}

impl PersistenceGateway for InMemoryStore {
    fn upsert_stations<'a>(
        &'a self,
        stations: &'a [StationRecord],
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        self.upsert(stations).boxed()
    }

    fn insert_availabilities<'a>(
        &'a self,
        availabilities: &'a [AvailabilityRecord],
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        self.append_availability(availabilities).boxed()
    }

    fn insert_predictions<'a>(
        &'a self,
        predictions: &'a [PredictionRecord],
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        self.append_predictions(predictions).boxed()
    }

    fn get_stations_with_availability(
        &self,
    ) -> BoxFuture<'_, Result<Vec<CombinedStationView>, PersistenceError>> {
        self.combined().boxed()
    }

    fn get_latest_predictions(&self) -> BoxFuture<'_, Result<Vec<PredictionRecord>, PersistenceError>> {
        self.latest_predictions().boxed()
    }

    fn get_availability_since(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<AvailabilityRecord>, PersistenceError>> {
        self.since(since).boxed()
    }

    fn health_check(&self) -> BoxFuture<'_, Result<(), PersistenceError>> {
        async { Ok(()) }.boxed()
    }
}
