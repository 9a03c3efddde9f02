//! Conversion from feed entries to stored records.
//!
//! Pure field mapping: identity fields are copied verbatim and no defaults
//! are invented. Store-assigned fields (ids, timestamps) are left empty.

use crate::domain::{AvailabilityRecord, StationRecord};

use super::types::{StationSource, StatusSource};

/// Maps a station-information entry to a [`StationRecord`].
#[must_use]
pub fn to_station(source: &StationSource) -> StationRecord {
    StationRecord {
        station_id: source.station_id.clone(),
        name: source.name.clone(),
        lat: source.lat,
        lon: source.lon,
        capacity: source.capacity,
        created_at: None,
        updated_at: None,
    }
}

/// Maps a station-status entry to an [`AvailabilityRecord`].
#[must_use]
pub fn to_availability(source: &StatusSource) -> AvailabilityRecord {
    AvailabilityRecord {
        id: None,
        station_id: source.station_id.clone(),
        num_bikes_available: source.num_bikes_available,
        num_docks_available: source.num_docks_available,
        is_installed: source.is_installed,
        is_renting: source.is_renting,
        is_returning: source.is_returning,
        last_reported: source.last_reported,
        recorded_at: None,
    }
}
