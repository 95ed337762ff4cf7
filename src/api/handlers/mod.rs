//! REST endpoint handlers organized by resource.

pub mod jobs;
pub mod markets;
pub mod sync;
pub mod system;

use axum::Router;
use axum::routing::post;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync/pools", post(sync::trigger_pools))
        .route("/sync/protocols", post(sync::trigger_protocols))
        .merge(jobs::routes())
        .merge(markets::routes())
}
