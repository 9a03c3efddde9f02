//! REST endpoint handlers organized by resource.

pub mod stations;
pub mod system;
pub mod triggers;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(stations::routes())
        .merge(triggers::routes())
}
