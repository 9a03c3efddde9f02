//! Data Transfer Objects for REST request/response serialization.

pub mod station_dto;
pub mod trigger_dto;

pub use station_dto::*;
pub use trigger_dto::*;
