use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::{AppError, Result};
use crate::services::ProvisioningService;
use crate::AppState;

/// Readiness probe with a side effect: an endpoint that exists but has no
/// deployed model gets a background deploy kicked off, so the next predict
/// lands warm. The deploy is fire-and-forget; its failure shows up in logs
/// only.
pub async fn ping_handler(
    Path(vein_type): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> Result<(StatusCode, Json<Value>)> {
    let spec = state
        .registry
        .get(&vein_type)
        .ok_or_else(|| {
            AppError::ValidationError(format!(
                "Invalid vein type. Must be one of: {}",
                state.registry.known_types().join(", ")
            ))
        })?
        .clone();

    let endpoint_id = body
        .as_ref()
        .and_then(|Json(value)| value.get("endpointId"))
        .and_then(Value::as_str)
        .unwrap_or(&spec.endpoint_id)
        .to_string();
    info!("Pinging endpoint {} for {}", endpoint_id, vein_type);

    state.usage.record_use(&vein_type).await;

    match state.provisioner.get_endpoint(&endpoint_id).await {
        Ok(endpoint) if !endpoint.deployed_models.is_empty() => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "endpoint_id": endpoint_id,
                "display_name": endpoint.display_name,
                "model_type": vein_type,
                "deployed_models": endpoint
                    .deployed_models
                    .iter()
                    .map(|deployed| json!({
                        "id": deployed.id,
                        "model": deployed.model,
                        "display_name": deployed.display_name,
                    }))
                    .collect::<Vec<_>>(),
            })),
        )),
        Ok(_) => {
            let provisioner = state.provisioner.clone();
            let warm_endpoint = endpoint_id.clone();
            tokio::spawn(async move {
                let provisioning = ProvisioningService::new(provisioner);
                match provisioning.ensure_deployed(&spec, &warm_endpoint).await {
                    Ok(_) => {
                        info!("Successfully deployed model to endpoint {}", warm_endpoint)
                    }
                    Err(e) => error!("Background model deployment failed: {}", e),
                }
            });
            Ok((
                StatusCode::ACCEPTED,
                Json(json!({
                    "status": "warming",
                    "message": "Endpoint exists but has no deployed models. Deploying model...",
                    "endpoint_id": endpoint_id,
                    "model_type": vein_type,
                })),
            ))
        }
        Err(e) => {
            error!("Error checking endpoint {}: {}", endpoint_id, e);
            Ok((
                StatusCode::NOT_FOUND,
                Json(json!({
                    "status": "not_ready",
                    "error": format!("Failed to access endpoint: {}", e),
                    "endpoint_id": endpoint_id,
                    "model_type": vein_type,
                })),
            ))
        }
    }
}
