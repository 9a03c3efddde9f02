//! # bikeshare-orchestrator
//!
//! Collects bike-share station telemetry, stores it, and keeps a set of
//! availability predictions fresh by driving an external prediction
//! service. A small REST API serves current and predicted availability and
//! lets operators trigger either cycle by hand.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── Scheduler (scheduler/)
//!     │     ├── collection loop ── StationService ──┐
//!     │     └── prediction loop ── InferenceService ┤
//!     │                                             │
//!     ├── FeedClient (feed/)      PredictionClient (inference/)
//!     │
//!     └── PersistenceGateway (persistence/)
//!           ├── PostgresStore
//!           └── InMemoryStore
//! ```
//!
//! The two loops are independent tasks sharing only the store and the
//! HTTP clients. Neither loop can fail the process; only configuration and
//! database connectivity problems at startup are fatal.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod feed;
pub mod inference;
pub mod metrics;
pub mod persistence;
pub mod scheduler;
pub mod server;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;
