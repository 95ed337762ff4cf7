//! Read endpoints over the synced datasets.
//!
//! Thin pass-throughs: ordering and limiting are delegated to SQL, no
//! transformation happens here.

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::routing::get;

use crate::api::dto::LimitParams;
use crate::app_state::AppState;
use crate::error::SyncError;
use crate::storage::Storage;
use crate::storage::models::{PoolSummary, ProtocolSummary};

/// `GET /api/v1/pools` — Highest-TVL pools.
///
/// # Errors
///
/// Returns [`SyncError::StorageRead`] when the query fails.
#[utoipa::path(
    get,
    path = "/api/v1/pools",
    tag = "Markets",
    summary = "Top pools by TVL",
    params(LimitParams),
    responses(
        (status = 200, description = "Pool summaries, TVL descending", body = Vec<PoolSummary>),
    )
)]
pub async fn top_pools(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<PoolSummary>>, SyncError> {
    let pools = state.storage.top_pools(params.clamped()).await?;
    Ok(Json(pools))
}

/// `GET /api/v1/protocols` — Highest-TVL protocols.
///
/// # Errors
///
/// Returns [`SyncError::StorageRead`] when the query fails.
#[utoipa::path(
    get,
    path = "/api/v1/protocols",
    tag = "Markets",
    summary = "Top protocols by TVL",
    params(LimitParams),
    responses(
        (status = 200, description = "Protocol summaries, TVL descending", body = Vec<ProtocolSummary>),
    )
)]
pub async fn top_protocols(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<ProtocolSummary>>, SyncError> {
    let protocols = state.storage.top_protocols(params.clamped()).await?;
    Ok(Json(protocols))
}

/// Market read routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pools", get(top_pools))
        .route("/protocols", get(top_protocols))
}
