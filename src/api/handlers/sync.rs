//! Manual sync trigger handlers.
//!
//! Each endpoint runs one orchestrated sync to completion and reports
//! the outcome as a well-formed JSON body: HTTP 200 when the run
//! succeeded, HTTP 500 when it failed, never an unhandled fault.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::json;

use crate::app_state::AppState;
use crate::error::SyncError;
use crate::sync::{DatasetKind, SyncOutcome};

/// `POST /api/v1/sync/pools` — Run the pools sync now.
#[utoipa::path(
    post,
    path = "/api/v1/sync/pools",
    tag = "Sync",
    summary = "Trigger a pools sync",
    description = "Runs one fetch → map → upsert pass for the pools dataset and waits for it to finish.",
    responses(
        (status = 200, description = "Sync completed"),
        (status = 500, description = "Sync failed; body carries the error and the job id when one was created"),
    )
)]
pub async fn trigger_pools(State(state): State<AppState>) -> Response {
    trigger(&state, DatasetKind::Pools).await
}

/// `POST /api/v1/sync/protocols` — Run the protocols sync now.
#[utoipa::path(
    post,
    path = "/api/v1/sync/protocols",
    tag = "Sync",
    summary = "Trigger a protocols sync",
    description = "Runs one fetch → map → upsert pass for the protocols dataset and waits for it to finish.",
    responses(
        (status = 200, description = "Sync completed"),
        (status = 500, description = "Sync failed; body carries the error and the job id when one was created"),
    )
)]
pub async fn trigger_protocols(State(state): State<AppState>) -> Response {
    trigger(&state, DatasetKind::Protocols).await
}

async fn trigger(state: &AppState, kind: DatasetKind) -> Response {
    let result = state.orchestrator.run(kind).await;
    let (status, body) = trigger_response(kind, &result);
    (status, Json(body)).into_response()
}

/// Builds the trigger response body from a run result.
///
/// The per-kind processed count is keyed `<kind>Processed`
/// (e.g. `poolsProcessed`) to match the dashboard consumers.
fn trigger_response(
    kind: DatasetKind,
    result: &Result<SyncOutcome, SyncError>,
) -> (StatusCode, serde_json::Value) {
    let timestamp = Utc::now().to_rfc3339();

    // The processed count is keyed per kind, so the object is built by
    // hand rather than with the json! macro.
    let data = |outcome: &SyncOutcome, with_total: bool| {
        let mut map = serde_json::Map::new();
        map.insert("jobId".to_string(), json!(outcome.job_id));
        map.insert(
            format!("{}Processed", kind.noun()),
            json!(outcome.records_processed),
        );
        if with_total {
            map.insert(
                "totalSourceRecords".to_string(),
                json!(outcome.total_source_records),
            );
        }
        serde_json::Value::Object(map)
    };

    match result {
        Ok(outcome) if outcome.is_success() => (
            StatusCode::OK,
            json!({
                "success": true,
                "message": format!("{} sync completed", kind.noun()),
                "data": data(outcome, true),
                "timestamp": timestamp,
            }),
        ),
        Ok(outcome) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "success": false,
                "message": format!("{} sync failed", kind.noun()),
                "error": outcome.error.as_deref().unwrap_or("unknown error"),
                "data": data(outcome, false),
                "timestamp": timestamp,
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "success": false,
                "message": format!("{} sync failed", kind.noun()),
                "error": e.to_string(),
                "timestamp": timestamp,
            }),
        ),
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn outcome(processed: u64, error: Option<&str>) -> SyncOutcome {
        SyncOutcome {
            job_id: Uuid::new_v4(),
            total_source_records: 3,
            records_processed: processed,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn success_body_carries_kind_keyed_count() {
        let result = Ok(outcome(2, None));
        let (status, body) = trigger_response(DatasetKind::Pools, &result);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["poolsProcessed"], 2);
        assert!(body["data"]["jobId"].is_string());
        assert!(body["timestamp"].is_string());
    }

    #[test]
    fn failed_outcome_is_500_with_error_and_partial_count() {
        let result = Ok(outcome(100, Some("storage write failed: chunk 3")));
        let (status, body) = trigger_response(DatasetKind::Pools, &result);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "storage write failed: chunk 3");
        assert_eq!(body["data"]["poolsProcessed"], 100);
    }

    #[test]
    fn orchestrator_error_is_500_without_data() {
        let result = Err(SyncError::StorageWrite("create job: down".to_string()));
        let (status, body) = trigger_response(DatasetKind::Protocols, &result);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body.get("data").is_none());
        assert_eq!(body["message"], "protocols sync failed");
    }
}
