use axum::{
    extract::{Path, State},
    response::Json,
};
use base64ct::{Base64, Encoding};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{AppError, Result};
use crate::services::ProvisioningService;
use crate::AppState;

/// Decoded-payload cap, matching the backing API's request-size limit.
const MAX_IMAGE_BYTES: usize = 1_572_864; // 1.5 MB

/// The one response shape this service exposes: `predictions[0]` of the
/// backing response, flattened here and nowhere else.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub display_names: Vec<String>,
    pub confidences: Vec<f64>,
    pub deployed_model_id: String,
    pub model: String,
    pub model_display_name: String,
    pub model_version_id: String,
    pub timestamp: String,
    pub status: String,
}

pub async fn predict_handler(
    Path(vein_type): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> Result<Json<PredictionResponse>> {
    let spec = state.registry.get(&vein_type).ok_or_else(|| {
        AppError::ValidationError(format!(
            "Vein type must be one of: {}",
            state.registry.known_types().join(", ")
        ))
    })?;

    let Some(Json(body)) = body else {
        return Err(AppError::ValidationError(
            "Request must include instances array".to_string(),
        ));
    };

    let instances = body
        .get("instances")
        .and_then(Value::as_array)
        .filter(|instances| !instances.is_empty())
        .ok_or_else(|| {
            AppError::ValidationError("Instances must be a non-empty array".to_string())
        })?;

    let mut processed = Vec::with_capacity(instances.len());
    for instance in instances {
        let content = instance
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::ValidationError(
                    "Each instance must be an object with 'content' field".to_string(),
                )
            })?;
        // Base64 arrives from browsers with stray newlines; strip before
        // validating.
        let content: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        let image = Base64::decode_vec(&content)
            .map_err(|e| AppError::ValidationError(format!("Invalid base64 image content: {}", e)))?;
        if image.len() > MAX_IMAGE_BYTES {
            return Err(AppError::ValidationError(
                "Image size must be less than 1.5MB".to_string(),
            ));
        }
        processed.push(json!({ "content": content }));
    }

    let parameters = body
        .get("parameters")
        .cloned()
        .unwrap_or_else(|| json!({ "confidenceThreshold": 0.0, "maxPredictions": 5 }));
    let requested_endpoint = body
        .pointer("/metadata/endpointId")
        .and_then(Value::as_str)
        .unwrap_or(&spec.endpoint_id)
        .to_string();

    // Exactly one usage event per accepted request, before any remote call.
    state.usage.record_use(&vein_type).await;

    let endpoint_id = match state.pool.acquire(&vein_type).await {
        Some(endpoint_id) => endpoint_id,
        None => {
            if state.quota.check_and_evict().await {
                info!(
                    "Preemptive eviction freed quota before provisioning {}",
                    vein_type
                );
            }
            let provisioning = ProvisioningService::new(state.provisioner.clone());
            let endpoint = provisioning.ensure_deployed(spec, &requested_endpoint).await?;
            let endpoint_id = endpoint.endpoint_id().to_string();
            state.pool.add(&vein_type, &endpoint_id, &endpoint.name).await;
            state.reclaim.arm(
                &vein_type,
                &endpoint_id,
                state.usage.adaptive_timeout(&vein_type).await,
            );
            endpoint_id
        }
    };

    let outcome = state
        .provisioner
        .predict(&endpoint_id, processed, parameters)
        .await;

    // Whatever the remote call did, the handle goes back to the pool before
    // any error propagates.
    state.pool.release(&vein_type, &endpoint_id).await;
    state.reclaim.arm(
        &vein_type,
        &endpoint_id,
        state.usage.adaptive_timeout(&vein_type).await,
    );

    let response = outcome?;
    let prediction = response.predictions.first().cloned().ok_or_else(|| {
        AppError::RemoteCallError("No predictions returned from model".to_string())
    })?;

    Ok(Json(PredictionResponse {
        display_names: field_vec(&prediction, "displayNames"),
        confidences: field_vec(&prediction, "confidences"),
        deployed_model_id: response.deployed_model_id,
        model: response.model,
        model_display_name: response.model_display_name,
        model_version_id: response.model_version_id,
        timestamp: Utc::now().to_rfc3339(),
        status: "success".to_string(),
    }))
}

fn field_vec<T: serde::de::DeserializeOwned>(prediction: &Value, field: &str) -> Vec<T> {
    prediction
        .get(field)
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}
