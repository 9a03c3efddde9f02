//! Station metadata, availability samples, and the combined serving view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A record that violates one of the station/availability invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// The station identifier is empty.
    #[error("station ID is required")]
    MissingStationId,

    /// The station name is empty.
    #[error("station {station_id}: name is required")]
    MissingName {
        /// Station the record belongs to.
        station_id: String,
    },

    /// The dock capacity is negative.
    #[error("station {station_id}: capacity {capacity} cannot be negative")]
    NegativeCapacity {
        /// Station the record belongs to.
        station_id: String,
        /// Offending capacity value.
        capacity: i32,
    },

    /// A bikes/docks counter is negative.
    #[error("station {station_id}: availability counts cannot be negative")]
    NegativeAvailability {
        /// Station the record belongs to.
        station_id: String,
    },
}

/// Station metadata, upserted on every collection cycle.
///
/// `created_at` and `updated_at` are assigned by the store and are `None`
/// on records that have not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StationRecord {
    /// Stable upstream station identifier.
    pub station_id: String,
    /// Display name.
    pub name: String,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Number of docks at the station.
    pub capacity: i32,
    /// First time the station was stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last time the station row was rewritten.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StationRecord {
    /// Checks the identity and capacity invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] naming the first violated invariant.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.station_id.is_empty() {
            return Err(RecordError::MissingStationId);
        }
        if self.name.is_empty() {
            return Err(RecordError::MissingName {
                station_id: self.station_id.clone(),
            });
        }
        if self.capacity < 0 {
            return Err(RecordError::NegativeCapacity {
                station_id: self.station_id.clone(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

/// One availability sample for one station in one collection cycle.
///
/// Append-only: rows are never updated after insert. The operational flags
/// keep the upstream 0/1 integer encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityRecord {
    /// Store-assigned row id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Station this sample belongs to.
    pub station_id: String,
    /// Bikes available for rental.
    pub num_bikes_available: i32,
    /// Empty docks available for returns.
    pub num_docks_available: i32,
    /// Whether the station is installed (0/1).
    pub is_installed: i32,
    /// Whether the station is renting (0/1).
    pub is_renting: i32,
    /// Whether the station accepts returns (0/1).
    pub is_returning: i32,
    /// Upstream report time, epoch seconds.
    pub last_reported: i64,
    /// Local recording time, assigned by the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl AvailabilityRecord {
    /// Checks the identity and non-negative counter invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] naming the first violated invariant.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.station_id.is_empty() {
            return Err(RecordError::MissingStationId);
        }
        if self.num_bikes_available < 0 || self.num_docks_available < 0 {
            return Err(RecordError::NegativeAvailability {
                station_id: self.station_id.clone(),
            });
        }
        Ok(())
    }
}

/// Latest station metadata joined with its most recent availability sample.
///
/// Derived on read and never persisted. Stations without any sample report
/// zero for every availability field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CombinedStationView {
    /// Station metadata.
    #[serde(flatten)]
    pub station: StationRecord,
    /// Bikes available in the latest sample.
    pub num_bikes_available: i32,
    /// Docks available in the latest sample.
    pub num_docks_available: i32,
    /// Installed flag of the latest sample.
    pub is_installed: i32,
    /// Renting flag of the latest sample.
    pub is_renting: i32,
    /// Returning flag of the latest sample.
    pub is_returning: i32,
    /// Upstream report time of the latest sample.
    pub last_reported: i64,
}

impl CombinedStationView {
    /// Joins a station with an optional latest sample.
    #[must_use]
    pub fn from_parts(station: StationRecord, latest: Option<&AvailabilityRecord>) -> Self {
        match latest {
            Some(a) => Self {
                station,
                num_bikes_available: a.num_bikes_available,
                num_docks_available: a.num_docks_available,
                is_installed: a.is_installed,
                is_renting: a.is_renting,
                is_returning: a.is_returning,
                last_reported: a.last_reported,
            },
            None => Self {
                station,
                num_bikes_available: 0,
                num_docks_available: 0,
                is_installed: 0,
                is_renting: 0,
                is_returning: 0,
                last_reported: 0,
            },
        }
    }
}
