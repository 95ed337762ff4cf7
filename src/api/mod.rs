//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All resource endpoints are mounted under `/api/v1`; `/health` lives
//! at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for the service.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "llama-sync",
        description = "Scheduled DeFi market-data synchronization service"
    ),
    paths(
        handlers::sync::trigger_pools,
        handlers::sync::trigger_protocols,
        handlers::jobs::list_jobs,
        handlers::jobs::scheduler_status,
        handlers::markets::top_pools,
        handlers::markets::top_protocols,
        handlers::system::health_handler,
    ),
    tags(
        (name = "Sync", description = "Manual sync triggers"),
        (name = "Jobs", description = "Sync-job audit trail and scheduler status"),
        (name = "Markets", description = "Read access to the synced datasets"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}
