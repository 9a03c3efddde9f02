//! PostgreSQL store against a real database.
//!
//! Runs only when `TEST_DATABASE_URL` points at a disposable database;
//! otherwise every test returns early.

#![allow(clippy::panic)]

use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio_test::assert_ok;

use bikeshare_orchestrator::config::DatabaseConfig;
use bikeshare_orchestrator::domain::{AvailabilityRecord, PredictionRecord, StationRecord};
use bikeshare_orchestrator::persistence::{PersistenceGateway, PostgresStore};

async fn store() -> Option<PostgresStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        persistence_enabled: true,
        url,
        max_connections: 2,
        min_connections: 0,
        connect_timeout: Duration::from_secs(5),
    };
    let store = assert_ok!(PostgresStore::connect(&config).await);
    assert_ok!(store.run_migrations().await);
    Some(store)
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

fn station(id: &str, name: &str, capacity: i32) -> StationRecord {
    StationRecord {
        station_id: id.to_string(),
        name: name.to_string(),
        lat: 41.88,
        lon: -87.63,
        capacity,
        created_at: None,
        updated_at: None,
    }
}

fn sample(id: &str, bikes: i32) -> AvailabilityRecord {
    AvailabilityRecord {
        id: None,
        station_id: id.to_string(),
        num_bikes_available: bikes,
        num_docks_available: 20 - bikes,
        is_installed: 1,
        is_renting: 1,
        is_returning: 1,
        last_reported: 1_704_110_400,
        recorded_at: None,
    }
}

#[tokio::test]
async fn upsert_keeps_one_row_per_station() {
    let Some(store) = store().await else { return };
    let id = unique("upsert");

    assert_ok!(store.upsert_stations(&[station(&id, "Before", 10)]).await);
    assert_ok!(store.upsert_stations(&[station(&id, "After", 12)]).await);
    assert_ok!(store.insert_availabilities(&[sample(&id, 4), sample(&id, 9)]).await);

    let views = assert_ok!(store.get_stations_with_availability().await);
    let mine: Vec<_> = views.iter().filter(|v| v.station.station_id == id).collect();
    assert_eq!(mine.len(), 1);
    let Some(view) = mine.first() else {
        panic!("station missing from view");
    };
    assert_eq!(view.station.name, "After");
    assert_eq!(view.station.capacity, 12);
    assert_eq!(view.num_bikes_available, 9);
    assert!(view.station.created_at.is_some());
}

#[tokio::test]
async fn availability_since_is_ordered() {
    let Some(store) = store().await else { return };
    let id = unique("since");
    let before = Utc::now() - chrono::Duration::seconds(1);

    assert_ok!(store.upsert_stations(&[station(&id, "Since", 20)]).await);
    assert_ok!(store.insert_availabilities(&[sample(&id, 1)]).await);
    assert_ok!(store.insert_availabilities(&[sample(&id, 2)]).await);

    let rows = assert_ok!(store.get_availability_since(before).await);
    let bikes: Vec<_> = rows
        .iter()
        .filter(|r| r.station_id == id)
        .map(|r| r.num_bikes_available)
        .collect();
    assert_eq!(bikes, [1, 2]);
    assert!(rows.iter().all(|r| r.id.is_some() && r.recorded_at.is_some()));
}

#[tokio::test]
async fn latest_prediction_per_station() {
    let Some(store) = store().await else { return };
    let id = unique("predict");
    let prediction = |class: i32| PredictionRecord {
        id: None,
        station_id: id.clone(),
        predicted_availability_class: class,
        availability_prediction: format!("class-{class}"),
        prediction_time: Utc.with_ymd_and_hms(2024, 1, 1, 13, 0, 0).single().unwrap_or_default(),
        horizon_hours: 1,
        created_at: None,
    };

    assert_ok!(store.insert_predictions(&[prediction(0)]).await);
    assert_ok!(store.insert_predictions(&[prediction(2)]).await);

    let latest = assert_ok!(store.get_latest_predictions().await);
    let mine: Vec<_> = latest.iter().filter(|p| p.station_id == id).collect();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine.first().map(|p| p.predicted_availability_class), Some(2));
}

#[tokio::test]
async fn health_check_answers() {
    let Some(store) = store().await else { return };
    assert_ok!(store.health_check().await);
}
