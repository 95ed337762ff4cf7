//! Job audit and scheduler status handlers.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::api::dto::LimitParams;
use crate::app_state::AppState;
use crate::error::SyncError;
use crate::scheduler::SchedulerStatus;
use crate::storage::Storage;
use crate::storage::models::SyncJob;

/// `GET /api/v1/jobs` — Most recent sync-job rows, newest first.
///
/// # Errors
///
/// Returns [`SyncError::StorageRead`] when the query fails.
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "Jobs",
    summary = "List recent sync jobs",
    description = "Returns the last N sync-job records for audit viewing.",
    params(LimitParams),
    responses(
        (status = 200, description = "Recent job rows", body = Vec<SyncJob>),
    )
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<SyncJob>>, SyncError> {
    let jobs = state.storage.recent_jobs(params.clamped()).await?;
    Ok(Json(jobs))
}

/// `GET /api/v1/scheduler` — Scheduler status snapshot.
#[utoipa::path(
    get,
    path = "/api/v1/scheduler",
    tag = "Jobs",
    summary = "Scheduler status",
    description = "Reports whether the scheduler is running and which named tasks are registered.",
    responses(
        (status = 200, description = "Status snapshot", body = SchedulerStatus),
    )
)]
pub async fn scheduler_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.status().await)
}

/// Job and scheduler routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/scheduler", get(scheduler_status))
}
