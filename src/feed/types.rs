//! Wire types for the two upstream station feeds.
//!
//! Both feeds share the `{"data": {"stations": [...]}}` envelope; only the
//! element type differs. Unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// The `{"data": {"stations": [...]}}` envelope shared by both feeds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedEnvelope<T> {
    /// Payload wrapper.
    pub data: FeedData<T>,
}

/// Inner `data` object of a feed response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedData<T> {
    /// Station entries; may legitimately be empty.
    pub stations: Vec<T>,
}

/// A station metadata entry from the station-information feed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StationSource {
    /// Upstream station identifier.
    pub station_id: String,
    /// Display name.
    pub name: String,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Number of docks.
    pub capacity: i32,
}

/// A live status entry from the station-status feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatusSource {
    /// Upstream station identifier.
    pub station_id: String,
    /// Bikes available for rental.
    pub num_bikes_available: i32,
    /// Docks available for returns.
    pub num_docks_available: i32,
    /// Installed flag (0/1).
    pub is_installed: i32,
    /// Renting flag (0/1).
    pub is_renting: i32,
    /// Returning flag (0/1).
    pub is_returning: i32,
    /// Report time, epoch seconds.
    pub last_reported: i64,
}

/// Both feeds, fetched together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    /// Entries from the station-information feed.
    pub stations: Vec<StationSource>,
    /// Entries from the station-status feed.
    pub statuses: Vec<StatusSource>,
}
