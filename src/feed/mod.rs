//! Upstream station feeds.
//!
//! Two read-only JSON endpoints describe the network: one with station
//! metadata (identity, geometry, capacity) and one with live operational
//! status. [`FeedClient`] fetches both together; [`convert`] maps their
//! entries onto the stored record types.

mod client;
pub mod convert;
mod error;
mod types;

pub use client::{
    DEFAULT_STATION_INFO_URL, DEFAULT_STATION_STATUS_URL, FeedClient, FeedConfig, FeedSource,
};
pub use convert::{to_availability, to_station};
pub use error::FeedError;
pub use types::{FeedData, FeedEnvelope, FeedSnapshot, StationSource, StatusSource};
