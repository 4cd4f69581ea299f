use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::AppState;

/// Pool contents and in-window usage counters.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "active_endpoints": state.pool.snapshot().await,
        "usage_patterns": state.usage.counts().await,
    }))
}

/// Live quota report plus an empirical create+delete probe: listing says how
/// close the project is to the ceiling, the probe says whether creating one
/// more endpoint would actually succeed.
pub async fn quota_check_handler(
    State(state): State<AppState>,
) -> std::result::Result<Json<Value>, (StatusCode, Json<Value>)> {
    let endpoints = state.provisioner.list_endpoints().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "ERROR", "error": e.to_string() })),
        )
    })?;

    let managed = state.pool.managed().await;
    let managed_endpoints: Vec<Value> = managed
        .iter()
        .map(|(model_type, endpoint_id, in_use)| {
            json!({
                "model_type": model_type,
                "endpoint_id": endpoint_id,
                "in_use": in_use,
            })
        })
        .collect();

    let probe_name = format!("quota-test-{}", Uuid::new_v4());
    let (test_status, error_message) =
        match state.provisioner.create_endpoint(&probe_name, None).await {
            Ok(probe) => {
                if let Err(e) = state.provisioner.delete_endpoint(probe.endpoint_id()).await {
                    error!("Error deleting probe endpoint {}: {}", probe.endpoint_id(), e);
                }
                ("QUOTA_AVAILABLE", None)
            }
            Err(e) => ("QUOTA_ERROR", Some(e.to_string())),
        };

    Ok(Json(json!({
        "project": state.env.project_id,
        "location": state.env.location,
        "total_endpoint_count": endpoints.len(),
        "managed_endpoint_count": managed.len(),
        "managed_endpoints": managed_endpoints,
        "all_endpoints": endpoints
            .iter()
            .map(|endpoint| json!({
                "id": endpoint.endpoint_id(),
                "display_name": endpoint.display_name,
                "create_time": endpoint.create_time,
            }))
            .collect::<Vec<_>>(),
        "test_status": test_status,
        "error_message": error_message,
    })))
}

/// Force-deletes every managed handle not currently serving a request.
pub async fn cleanup_handler(State(state): State<AppState>) -> Json<Value> {
    let removed = state.pool.cleanup_idle().await;
    info!("Cleanup request removed {} endpoints", removed);
    Json(json!({
        "status": "success",
        "message": format!("Cleaned up {} endpoints", removed),
        "remaining_endpoints": state.pool.snapshot().await,
    }))
}
