//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{PersistenceError, PersistenceGateway};
use crate::config::DatabaseConfig;
use crate::domain::{AvailabilityRecord, CombinedStationView, PredictionRecord, StationRecord};

/// Upper bound for the health-check round trip.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

const UPSERT_STATION: &str = "\
    INSERT INTO stations (station_id, name, lat, lon, capacity) \
    VALUES ($1, $2, $3, $4, $5) \
    ON CONFLICT (station_id) DO UPDATE SET \
        name = EXCLUDED.name, \
        lat = EXCLUDED.lat, \
        lon = EXCLUDED.lon, \
        capacity = EXCLUDED.capacity, \
        updated_at = NOW()";

const INSERT_AVAILABILITY: &str = "\
    INSERT INTO station_availability \
        (station_id, num_bikes_available, num_docks_available, \
         is_installed, is_renting, is_returning, last_reported) \
    VALUES ($1, $2, $3, $4, $5, $6, $7)";

const INSERT_PREDICTION: &str = "\
    INSERT INTO predictions \
        (station_id, predicted_availability_class, availability_prediction, \
         prediction_time, horizon_hours) \
    VALUES ($1, $2, $3, $4, $5)";

const SELECT_STATIONS_WITH_AVAILABILITY: &str = "\
    SELECT s.station_id, s.name, s.lat, s.lon, s.capacity, s.created_at, s.updated_at, \
           COALESCE(sa.num_bikes_available, 0), \
           COALESCE(sa.num_docks_available, 0), \
           COALESCE(sa.is_installed, 0), \
           COALESCE(sa.is_renting, 0), \
           COALESCE(sa.is_returning, 0), \
           COALESCE(sa.last_reported, 0) \
    FROM stations s \
    LEFT JOIN LATERAL ( \
        SELECT * FROM station_availability \
        WHERE station_id = s.station_id \
        ORDER BY recorded_at DESC, id DESC \
        LIMIT 1 \
    ) sa ON true \
    ORDER BY s.name";

const SELECT_LATEST_PREDICTIONS: &str = "\
    SELECT DISTINCT ON (station_id) \
           id, station_id, predicted_availability_class, availability_prediction, \
           prediction_time, horizon_hours, created_at \
    FROM predictions \
    ORDER BY station_id, created_at DESC, id DESC";

const SELECT_AVAILABILITY_SINCE: &str = "\
    SELECT id, station_id, num_bikes_available, num_docks_available, \
           is_installed, is_renting, is_returning, last_reported, recorded_at \
    FROM station_availability \
    WHERE recorded_at > $1 \
    ORDER BY recorded_at ASC, id ASC";

type CombinedRow = (
    String,
    String,
    f64,
    f64,
    i32,
    DateTime<Utc>,
    DateTime<Utc>,
    i32,
    i32,
    i32,
    i32,
    i32,
    i64,
);

type PredictionRow = (i64, String, i32, String, DateTime<Utc>, i32, DateTime<Utc>);

type AvailabilityRow = (i64, String, i32, i32, i32, i32, i32, i64, DateTime<Utc>);

/// PostgreSQL-backed store using `sqlx::PgPool`.
///
/// The pool is shared by both background loops and every request handler.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool and verifies it with one round trip.
    ///
    /// # Errors
    ///
    /// Returns the [`sqlx::Error`] if the database cannot be reached.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .max_lifetime(Duration::from_secs(5 * 60))
            .connect(&config.url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        tracing::info!(
            max_connections = config.max_connections,
            "connected to database"
        );
        Ok(Self::new(pool))
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`sqlx::migrate::MigrateError`] if a migration fails.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    /// Upserts stations in one transaction.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError::Database`] on failure; nothing is
    /// committed in that case.
    pub async fn upsert_stations(&self, stations: &[StationRecord]) -> Result<(), PersistenceError> {
        const OP: &str = "upsert stations";
        if stations.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(db_err(OP))?;
        for station in stations {
            sqlx::query(UPSERT_STATION)
                .bind(&station.station_id)
                .bind(&station.name)
                .bind(station.lat)
                .bind(station.lon)
                .bind(station.capacity)
                .execute(&mut *tx)
                .await
                .map_err(db_err(OP))?;
        }
        tx.commit().await.map_err(db_err(OP))?;
        Ok(())
    }

    /// Appends availability samples in one transaction.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError::Database`] on failure; nothing is
    /// committed in that case.
    pub async fn insert_availabilities(
        &self,
        availabilities: &[AvailabilityRecord],
    ) -> Result<(), PersistenceError> {
        const OP: &str = "insert availabilities";
        if availabilities.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(db_err(OP))?;
        for a in availabilities {
            sqlx::query(INSERT_AVAILABILITY)
                .bind(&a.station_id)
                .bind(a.num_bikes_available)
                .bind(a.num_docks_available)
                .bind(a.is_installed)
                .bind(a.is_renting)
                .bind(a.is_returning)
                .bind(a.last_reported)
                .execute(&mut *tx)
                .await
                .map_err(db_err(OP))?;
        }
        tx.commit().await.map_err(db_err(OP))?;
        Ok(())
    }

    /// Appends predictions in one transaction.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError::Database`] on failure; nothing is
    /// committed in that case.
    pub async fn insert_predictions(
        &self,
        predictions: &[PredictionRecord],
    ) -> Result<(), PersistenceError> {
        const OP: &str = "insert predictions";
        if predictions.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(db_err(OP))?;
        for p in predictions {
            sqlx::query(INSERT_PREDICTION)
                .bind(&p.station_id)
                .bind(p.predicted_availability_class)
                .bind(&p.availability_prediction)
                .bind(p.prediction_time)
                .bind(p.horizon_hours)
                .execute(&mut *tx)
                .await
                .map_err(db_err(OP))?;
        }
        tx.commit().await.map_err(db_err(OP))?;
        Ok(())
    }

    /// Loads every station with its latest availability sample.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError::Database`] on failure.
    pub async fn stations_with_availability(
        &self,
    ) -> Result<Vec<CombinedStationView>, PersistenceError> {
        let rows = sqlx::query_as::<_, CombinedRow>(SELECT_STATIONS_WITH_AVAILABILITY)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("load stations with availability"))?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    station_id,
                    name,
                    lat,
                    lon,
                    capacity,
                    created_at,
                    updated_at,
                    num_bikes_available,
                    num_docks_available,
                    is_installed,
                    is_renting,
                    is_returning,
                    last_reported,
                )| CombinedStationView {
                    station: StationRecord {
                        station_id,
                        name,
                        lat,
                        lon,
                        capacity,
                        created_at: Some(created_at),
                        updated_at: Some(updated_at),
                    },
                    num_bikes_available,
                    num_docks_available,
                    is_installed,
                    is_renting,
                    is_returning,
                    last_reported,
                },
            )
            .collect())
    }

    /// Loads the latest prediction per station using `DISTINCT ON`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError::Database`] on failure.
    pub async fn latest_predictions(&self) -> Result<Vec<PredictionRecord>, PersistenceError> {
        let rows = sqlx::query_as::<_, PredictionRow>(SELECT_LATEST_PREDICTIONS)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("load latest predictions"))?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    id,
                    station_id,
                    predicted_availability_class,
                    availability_prediction,
                    prediction_time,
                    horizon_hours,
                    created_at,
                )| PredictionRecord {
                    id: Some(id),
                    station_id,
                    predicted_availability_class,
                    availability_prediction,
                    prediction_time,
                    horizon_hours,
                    created_at: Some(created_at),
                },
            )
            .collect())
    }

    /// Loads availability samples recorded after `since`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError::Database`] on failure.
    pub async fn availability_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<AvailabilityRecord>, PersistenceError> {
        let rows = sqlx::query_as::<_, AvailabilityRow>(SELECT_AVAILABILITY_SINCE)
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("load availability"))?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    id,
                    station_id,
                    num_bikes_available,
                    num_docks_available,
                    is_installed,
                    is_renting,
                    is_returning,
                    last_reported,
                    recorded_at,
                )| AvailabilityRecord {
                    id: Some(id),
                    station_id,
                    num_bikes_available,
                    num_docks_available,
                    is_installed,
                    is_renting,
                    is_returning,
                    last_reported,
                    recorded_at: Some(recorded_at),
                },
            )
            .collect())
    }

    /// Pings the database within [`HEALTH_CHECK_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the ping fails or times out.
    pub async fn ping(&self) -> Result<(), PersistenceError> {
        const OP: &str = "health check";
        tokio::time::timeout(HEALTH_CHECK_TIMEOUT, sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map_err(|_| PersistenceError::Unavailable {
                operation: OP,
                message: format!("no answer within {HEALTH_CHECK_TIMEOUT:?}"),
            })?
            .map_err(db_err(OP))?;
        Ok(())
    }
}

impl PersistenceGateway for PostgresStore {
    fn upsert_stations<'a>(
        &'a self,
        stations: &'a [StationRecord],
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        PostgresStore::upsert_stations(self, stations).boxed()
    }

    fn insert_availabilities<'a>(
        &'a self,
        availabilities: &'a [AvailabilityRecord],
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        PostgresStore::insert_availabilities(self, availabilities).boxed()
    }

    fn insert_predictions<'a>(
        &'a self,
        predictions: &'a [PredictionRecord],
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        PostgresStore::insert_predictions(self, predictions).boxed()
    }

    fn get_stations_with_availability(
        &self,
    ) -> BoxFuture<'_, Result<Vec<CombinedStationView>, PersistenceError>> {
        self.stations_with_availability().boxed()
    }

    fn get_latest_predictions(&self) -> BoxFuture<'_, Result<Vec<PredictionRecord>, PersistenceError>> {
        self.latest_predictions().boxed()
    }

    fn get_availability_since(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<AvailabilityRecord>, PersistenceError>> {
        self.availability_since(since).boxed()
    }

    fn health_check(&self) -> BoxFuture<'_, Result<(), PersistenceError>> {
        self.ping().boxed()
    }
}

/// Builds a `map_err` adapter tagging a driver error with its operation.
fn db_err(operation: &'static str) -> impl Fn(sqlx::Error) -> PersistenceError {
    move |source| PersistenceError::Database { operation, source }
}
