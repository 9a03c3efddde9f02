//! Station service: one collection cycle from the feeds into the store.

use std::sync::Arc;

use crate::domain::{AvailabilityRecord, RecordError, StationRecord};
use crate::feed::{self, FeedError, FeedSource};
use crate::persistence::{PersistenceError, PersistenceGateway};

/// A failed collection cycle, tagged with the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// Fetching the feeds failed; nothing was written.
    #[error("fetch station data: {0}")]
    Fetch(#[source] FeedError),

    /// Every record of a non-empty snapshot is invalid; nothing was
    /// written.
    #[error("convert station data: all {rejected} records invalid, first: {first}")]
    Convert {
        /// Number of rejected records.
        rejected: usize,
        /// The first violation found.
        #[source]
        first: RecordError,
    },

    /// The station upsert failed; availability was not written.
    #[error("store stations: {0}")]
    StoreStations(#[source] PersistenceError),

    /// The availability insert failed; stations were already upserted.
    #[error("store availability: {0}")]
    StoreAvailability(#[source] PersistenceError),
}

impl RefreshError {
    /// Short name of the failing stage, for logs.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Convert { .. } => "convert",
            Self::StoreStations(_) => "store_stations",
            Self::StoreAvailability(_) => "store_availability",
        }
    }
}

/// Counts written by one successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Stations upserted.
    pub stations: usize,
    /// Availability samples appended.
    pub availabilities: usize,
    /// Invalid feed records left out of the cycle.
    pub skipped: usize,
}

/// Runs collection cycles: fetch, convert, upsert stations, append
/// availability.
///
/// Holds no state of its own, so the scheduler and the API can share one
/// instance and run cycles concurrently.
#[derive(Debug, Clone)]
pub struct StationService {
    feed: Arc<dyn FeedSource>,
    store: Arc<dyn PersistenceGateway>,
}

impl StationService {
    /// Creates a new `StationService`.
    #[must_use]
    pub fn new(feed: Arc<dyn FeedSource>, store: Arc<dyn PersistenceGateway>) -> Self {
        Self { feed, store }
    }

    /// Runs one collection cycle.
    ///
    /// Invalid records are skipped individually and counted in
    /// [`RefreshSummary::skipped`].
    ///
    /// The station upsert happens before the availability insert. They are
    /// separate transactions: a failed insert leaves the upsert in place.
    ///
    /// # Errors
    ///
    /// Returns a [`RefreshError`] naming the first stage that failed.
    pub async fn refresh_station_data(&self) -> Result<RefreshSummary, RefreshError> {
        let snapshot = self.feed.fetch().await.map_err(RefreshError::Fetch)?;

        let mut rejected = Vec::new();
        let stations = keep_valid(
            snapshot.stations.iter().map(feed::to_station),
            StationRecord::validate,
            &mut rejected,
        );
        let availabilities = keep_valid(
            snapshot.statuses.iter().map(feed::to_availability),
            AvailabilityRecord::validate,
            &mut rejected,
        );

        if stations.is_empty() && availabilities.is_empty() {
            if let Some(first) = rejected.first() {
                return Err(RefreshError::Convert {
                    rejected: rejected.len(),
                    first: first.clone(),
                });
            }
        }

        self.store
            .upsert_stations(&stations)
            .await
            .map_err(RefreshError::StoreStations)?;
        tracing::debug!(stations = stations.len(), "stations upserted");

        self.store
            .insert_availabilities(&availabilities)
            .await
            .map_err(RefreshError::StoreAvailability)?;

        tracing::info!(
            stations = stations.len(),
            availabilities = availabilities.len(),
            skipped = rejected.len(),
            "station data refreshed"
        );

        Ok(RefreshSummary {
            stations: stations.len(),
            availabilities: availabilities.len(),
            skipped: rejected.len(),
        })
    }
}

/// Keeps the records passing `validate`; the others are logged and their
/// errors appended to `rejected`.
fn keep_valid<T>(
    records: impl Iterator<Item = T>,
    validate: impl Fn(&T) -> Result<(), RecordError>,
    rejected: &mut Vec<RecordError>,
) -> Vec<T> {
    records
        .filter(|record| match validate(record) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "skipping invalid feed record");
                rejected.push(e);
                false
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::feed::FeedSnapshot;
    use crate::testing::{RecordingStore, StubFeed, station_source, status_source};

    fn service(feed: StubFeed, store: &Arc<RecordingStore>) -> StationService {
        let store = Arc::clone(store) as Arc<dyn PersistenceGateway>;
        StationService::new(Arc::new(feed), store)
    }

    #[tokio::test]
    async fn one_station_one_status() {
        let store = Arc::new(RecordingStore::new());
        let feed = StubFeed::new(FeedSnapshot {
            stations: vec![station_source("123", "Test")],
            statuses: vec![status_source("123", 5, 10)],
        });

        let Ok(summary) = service(feed, &store).refresh_station_data().await else {
            panic!("refresh should succeed");
        };
        assert_eq!(
            summary,
            RefreshSummary {
                stations: 1,
                availabilities: 1,
                skipped: 0,
            }
        );

        let recorded = store.recorded().await;
        assert_eq!(recorded.upserts.len(), 1);
        assert_eq!(recorded.availability_inserts.len(), 1);

        let Some([station]) = recorded.upserts.first().map(Vec::as_slice) else {
            panic!("expected exactly one station");
        };
        assert_eq!(station.station_id, "123");
        assert_eq!(station.name, "Test");
        assert_eq!(station.capacity, 15);

        let Some([availability]) = recorded.availability_inserts.first().map(Vec::as_slice) else {
            panic!("expected exactly one availability row");
        };
        assert_eq!(availability.station_id, "123");
        assert_eq!(availability.num_bikes_available, 5);
        assert_eq!(availability.num_docks_available, 10);
    }

    #[tokio::test]
    async fn counts_match_feed_sizes() {
        for n in [0_usize, 1, 7] {
            let store = Arc::new(RecordingStore::new());
            let ids: Vec<String> = (0..n).map(|i| format!("s{i}")).collect();
            let feed = StubFeed::new(FeedSnapshot {
                stations: ids.iter().map(|id| station_source(id, "Name")).collect(),
                statuses: ids.iter().map(|id| status_source(id, 1, 1)).collect(),
            });

            let Ok(summary) = service(feed, &store).refresh_station_data().await else {
                panic!("refresh should succeed for {n} stations");
            };
            assert_eq!(summary.stations, n);

            let recorded = store.recorded().await;
            assert_eq!(recorded.upserts.first().map(Vec::len), Some(n));
            assert_eq!(recorded.availability_inserts.first().map(Vec::len), Some(n));
        }
    }

    #[tokio::test]
    async fn fetch_failure_writes_nothing() {
        let store = Arc::new(RecordingStore::new());
        let result = service(StubFeed::failing(), &store)
            .refresh_station_data()
            .await;

        let Err(err) = result else {
            panic!("refresh should fail");
        };
        assert_eq!(err.stage(), "fetch");
        assert_eq!(store.recorded().await.write_count(), 0);
    }

    #[tokio::test]
    async fn invalid_record_is_skipped_and_the_rest_stored() {
        let store = Arc::new(RecordingStore::new());
        let ids: Vec<String> = (0..100).map(|i| format!("s{i}")).collect();
        let mut stations: Vec<_> = ids.iter().map(|id| station_source(id, "Name")).collect();
        stations.push(station_source("bad", ""));
        let mut statuses: Vec<_> = ids.iter().map(|id| status_source(id, 1, 1)).collect();
        statuses.push(status_source("neg", -1, 3));
        let feed = StubFeed::new(FeedSnapshot { stations, statuses });

        let Ok(summary) = service(feed, &store).refresh_station_data().await else {
            panic!("one bad record must not fail the cycle");
        };
        assert_eq!(
            summary,
            RefreshSummary {
                stations: 100,
                availabilities: 100,
                skipped: 2,
            }
        );

        let recorded = store.recorded().await;
        assert_eq!(recorded.upserts.first().map(Vec::len), Some(100));
        assert_eq!(recorded.availability_inserts.first().map(Vec::len), Some(100));
        assert!(
            recorded
                .upserts
                .iter()
                .flatten()
                .all(|s| s.station_id != "bad")
        );
    }

    #[tokio::test]
    async fn all_records_invalid_writes_nothing() {
        let store = Arc::new(RecordingStore::new());
        let feed = StubFeed::new(FeedSnapshot {
            stations: vec![station_source("1", ""), station_source("2", "")],
            statuses: vec![],
        });

        let Err(err) = service(feed, &store).refresh_station_data().await else {
            panic!("refresh should fail");
        };
        let RefreshError::Convert { rejected, first } = &err else {
            panic!("expected a convert error, got {err}");
        };
        assert_eq!(*rejected, 2);
        assert!(matches!(first, RecordError::MissingName { .. }));
        assert_eq!(err.stage(), "convert");
        assert_eq!(store.recorded().await.write_count(), 0);
    }

    #[tokio::test]
    async fn upsert_failure_skips_availability() {
        let store = Arc::new(RecordingStore::failing("upsert stations"));
        let feed = StubFeed::new(FeedSnapshot {
            stations: vec![station_source("1", "One")],
            statuses: vec![status_source("1", 2, 3)],
        });

        let Err(err) = service(feed, &store).refresh_station_data().await else {
            panic!("refresh should fail");
        };
        assert_eq!(err.stage(), "store_stations");

        let recorded = store.recorded().await;
        assert_eq!(recorded.upserts.len(), 1);
        assert!(recorded.availability_inserts.is_empty());
    }

    #[tokio::test]
    async fn availability_failure_is_reported() {
        let store = Arc::new(RecordingStore::failing("insert availabilities"));
        let feed = StubFeed::new(FeedSnapshot {
            stations: vec![station_source("1", "One")],
            statuses: vec![status_source("1", 2, 3)],
        });

        let Err(err) = service(feed, &store).refresh_station_data().await else {
            panic!("refresh should fail");
        };
        assert!(matches!(err, RefreshError::StoreAvailability(_)));
        assert_eq!(store.recorded().await.upserts.len(), 1);
    }
}
