use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One endpoint resource as the Vertex AI v1 REST API reports it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointResource {
    /// Full resource name: `projects/{p}/locations/{l}/endpoints/{id}`.
    pub name: String,
    pub display_name: String,
    pub create_time: Option<DateTime<Utc>>,
    pub deployed_models: Vec<DeployedModel>,
}

impl EndpointResource {
    /// Trailing numeric ID of the full resource name.
    pub fn endpoint_id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployedModel {
    pub id: String,
    pub model: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEndpointsResponse {
    #[serde(default)]
    pub endpoints: Vec<EndpointResource>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Long-running operation wrapper returned by create/deploy/undeploy/delete.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Raw predict response; `predictions` keeps the backing model's duck-typed
/// shape and is flattened once, at the request-handler boundary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PredictResponse {
    pub predictions: Vec<Value>,
    pub deployed_model_id: String,
    pub model: String,
    pub model_display_name: String,
    pub model_version_id: String,
}

/// Access token as served by the GCE metadata server.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}
