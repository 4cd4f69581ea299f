use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::vertex::types::{
    EndpointResource, ListEndpointsResponse, Operation, PredictResponse, TokenResponse,
};

/// Capability surface for provisioning backing endpoints and calling the
/// models deployed on them. Everything above this trait is testable with an
/// in-memory implementation.
#[async_trait]
pub trait EndpointProvisioner: Send + Sync {
    async fn get_endpoint(&self, endpoint_id: &str) -> Result<EndpointResource>;
    async fn create_endpoint(
        &self,
        display_name: &str,
        endpoint_id: Option<&str>,
    ) -> Result<EndpointResource>;
    async fn deploy_model(&self, endpoint_id: &str, model_id: &str) -> Result<()>;
    async fn undeploy_all(&self, endpoint_id: &str) -> Result<()>;
    async fn delete_endpoint(&self, endpoint_id: &str) -> Result<()>;
    async fn list_endpoints(&self) -> Result<Vec<EndpointResource>>;
    async fn predict(
        &self,
        endpoint_id: &str,
        instances: Vec<Value>,
        parameters: Value,
    ) -> Result<PredictResponse>;
}

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Bearer-token source: `GOOGLE_ACCESS_TOKEN` env override first, the GCE
/// metadata server otherwise. Tokens are cached until shortly before expiry.
struct TokenSource {
    http: Client,
    cached: RwLock<Option<(String, Instant)>>,
}

impl TokenSource {
    fn new(http: Client) -> Self {
        Self {
            http,
            cached: RwLock::new(None),
        }
    }

    async fn token(&self) -> Result<String> {
        if let Ok(token) = std::env::var("GOOGLE_ACCESS_TOKEN") {
            return Ok(token);
        }

        {
            let cached = self.cached.read().await;
            if let Some((token, expires)) = cached.as_ref() {
                if Instant::now() < *expires {
                    return Ok(token.clone());
                }
            }
        }

        let response = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| {
                AppError::ProvisionError(format!("Failed to reach metadata server: {}", e))
            })?;
        if !response.status().is_success() {
            return Err(AppError::ProvisionError(format!(
                "Metadata server returned {}",
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await.map_err(|e| {
            AppError::ProvisionError(format!("Invalid metadata token response: {}", e))
        })?;

        // Refresh a minute before the server-side expiry.
        let expires = Instant::now() + Duration::from_secs(token.expires_in.saturating_sub(60));
        *self.cached.write().await = Some((token.access_token.clone(), expires));
        debug!("Refreshed access token from metadata server");
        Ok(token.access_token)
    }
}

/// Vertex AI v1 REST client.
pub struct VertexAiClient {
    http: Client,
    project_id: String,
    location: String,
    machine_type: String,
    deploy_timeout: Duration,
    token: TokenSource,
}

impl VertexAiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                AppError::InternalServerError(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            token: TokenSource::new(http.clone()),
            http,
            project_id: config.project_id.clone(),
            location: config.location.clone(),
            machine_type: config.machine_type.clone(),
            deploy_timeout: Duration::from_secs(config.deploy_timeout_secs),
        })
    }

    fn api_base(&self) -> String {
        format!("https://{}-aiplatform.googleapis.com/v1", self.location)
    }

    fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.location)
    }

    fn endpoint_name(&self, endpoint_id: &str) -> String {
        format!("{}/endpoints/{}", self.parent(), endpoint_id)
    }

    fn model_name(&self, model_id: &str) -> String {
        format!("{}/models/{}", self.parent(), model_id)
    }

    async fn authed(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let token = self.token.token().await?;
        builder
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::ProvisionError(format!("Vertex AI request failed: {}", e)))
    }

    async fn expect_success(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::ProvisionError(format!(
            "{}: {} {}",
            context, status, body
        )))
    }

    fn check_operation(operation: Operation, context: &str) -> Result<()> {
        match operation.error {
            Some(error) => Err(AppError::ProvisionError(format!(
                "{}: {}",
                context, error.message
            ))),
            None => Ok(()),
        }
    }

    /// Polls a long-running operation until it completes or the deploy
    /// deadline passes.
    async fn wait_for_operation(&self, operation: Operation, context: &str) -> Result<()> {
        if operation.done {
            return Self::check_operation(operation, context);
        }
        let url = format!("{}/{}", self.api_base(), operation.name);
        let deadline = Instant::now() + self.deploy_timeout;
        loop {
            tokio::time::sleep(Duration::from_secs(2)).await;
            let response = self.authed(self.http.get(&url)).await?;
            let response = Self::expect_success(response, context).await?;
            let operation: Operation = response.json().await.map_err(|e| {
                AppError::ProvisionError(format!("{}: invalid operation response: {}", context, e))
            })?;
            if operation.done {
                return Self::check_operation(operation, context);
            }
            if Instant::now() >= deadline {
                return Err(AppError::ProvisionError(format!(
                    "{}: operation {} timed out",
                    context, operation.name
                )));
            }
        }
    }

    async fn start_operation(
        &self,
        builder: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<Operation> {
        let response = self.authed(builder).await?;
        let response = Self::expect_success(response, context).await?;
        response.json().await.map_err(|e| {
            AppError::ProvisionError(format!("{}: invalid operation response: {}", context, e))
        })
    }

    async fn undeploy(&self, endpoint_id: &str, deployed_model_id: &str) -> Result<()> {
        let url = format!(
            "{}/{}:undeployModel",
            self.api_base(),
            self.endpoint_name(endpoint_id)
        );
        let body = json!({ "deployedModelId": deployed_model_id });
        let operation = self
            .start_operation(self.http.post(&url).json(&body), "Failed to undeploy model")
            .await?;
        self.wait_for_operation(operation, "Failed to undeploy model")
            .await
    }
}

#[async_trait]
impl EndpointProvisioner for VertexAiClient {
    async fn get_endpoint(&self, endpoint_id: &str) -> Result<EndpointResource> {
        let url = format!("{}/{}", self.api_base(), self.endpoint_name(endpoint_id));
        let response = self.authed(self.http.get(&url)).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!(
                "Endpoint {} not found",
                endpoint_id
            )));
        }
        let response = Self::expect_success(response, "Failed to get endpoint").await?;
        response
            .json()
            .await
            .map_err(|e| AppError::ProvisionError(format!("Invalid endpoint response: {}", e)))
    }

    async fn create_endpoint(
        &self,
        display_name: &str,
        endpoint_id: Option<&str>,
    ) -> Result<EndpointResource> {
        let mut url = format!("{}/{}/endpoints", self.api_base(), self.parent());
        if let Some(id) = endpoint_id {
            url = format!("{}?endpointId={}", url, id);
        }
        let body = json!({ "displayName": display_name });
        let operation = self
            .start_operation(self.http.post(&url).json(&body), "Failed to create endpoint")
            .await?;
        // The operation name is `{endpoint resource}/operations/{op}`; keep
        // the endpoint part so the created resource can be read back.
        let resource_name = operation
            .name
            .split("/operations/")
            .next()
            .unwrap_or_default()
            .to_string();
        self.wait_for_operation(operation, "Failed to create endpoint")
            .await?;
        let created_id = resource_name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        info!("Created endpoint {} ({})", created_id, display_name);
        self.get_endpoint(&created_id).await
    }

    async fn deploy_model(&self, endpoint_id: &str, model_id: &str) -> Result<()> {
        let url = format!(
            "{}/{}:deployModel",
            self.api_base(),
            self.endpoint_name(endpoint_id)
        );
        let body = json!({
            "deployedModel": {
                "model": self.model_name(model_id),
                "dedicatedResources": {
                    "machineSpec": { "machineType": self.machine_type },
                    "minReplicaCount": 1,
                    "maxReplicaCount": 1
                }
            }
        });
        let operation = self
            .start_operation(self.http.post(&url).json(&body), "Failed to deploy model")
            .await?;
        self.wait_for_operation(operation, "Failed to deploy model")
            .await?;
        info!("Deployed model {} to endpoint {}", model_id, endpoint_id);
        Ok(())
    }

    async fn undeploy_all(&self, endpoint_id: &str) -> Result<()> {
        let endpoint = self.get_endpoint(endpoint_id).await?;
        let undeploys = endpoint
            .deployed_models
            .iter()
            .map(|deployed| self.undeploy(endpoint_id, &deployed.id));
        for result in futures::future::join_all(undeploys).await {
            result?;
        }
        Ok(())
    }

    async fn delete_endpoint(&self, endpoint_id: &str) -> Result<()> {
        let url = format!("{}/{}", self.api_base(), self.endpoint_name(endpoint_id));
        let operation = self
            .start_operation(self.http.delete(&url), "Failed to delete endpoint")
            .await?;
        self.wait_for_operation(operation, "Failed to delete endpoint")
            .await?;
        info!("Deleted endpoint {}", endpoint_id);
        Ok(())
    }

    async fn list_endpoints(&self) -> Result<Vec<EndpointResource>> {
        let base = format!("{}/{}/endpoints?pageSize=100", self.api_base(), self.parent());
        let mut endpoints = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = match &page_token {
                Some(token) => format!("{}&pageToken={}", base, token),
                None => base.clone(),
            };
            let response = self.authed(self.http.get(&url)).await?;
            let response = Self::expect_success(response, "Failed to list endpoints").await?;
            let page: ListEndpointsResponse = response.json().await.map_err(|e| {
                AppError::ProvisionError(format!("Invalid endpoint list response: {}", e))
            })?;
            endpoints.extend(page.endpoints);
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(endpoints),
            }
        }
    }

    async fn predict(
        &self,
        endpoint_id: &str,
        instances: Vec<Value>,
        parameters: Value,
    ) -> Result<PredictResponse> {
        let url = format!(
            "{}/{}:predict",
            self.api_base(),
            self.endpoint_name(endpoint_id)
        );
        let token = self.token.token().await?;
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "instances": instances, "parameters": parameters }))
            .send()
            .await
            .map_err(|e| AppError::RemoteCallError(format!("Prediction request failed: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::RemoteCallError(format!(
                "Endpoint {} returned {}: {}",
                endpoint_id, status, body
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::RemoteCallError(format!("Invalid prediction response: {}", e)))
    }
}
