use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use vexus_ondemand::error::{AppError, Result};
use vexus_ondemand::vertex::types::{DeployedModel, EndpointResource, PredictResponse};
use vexus_ondemand::vertex::EndpointProvisioner;

/// Scripted in-memory provisioner with call counts and failure switches.
pub struct MockProvisioner {
    endpoints: Arc<RwLock<HashMap<String, EndpointResource>>>,
    call_count: Arc<RwLock<HashMap<String, usize>>>,
    created: AtomicUsize,
    fail_predict: Arc<RwLock<bool>>,
    fail_teardown: Arc<RwLock<bool>>,
    fail_list: Arc<RwLock<bool>>,
    deploy_error: Arc<RwLock<Option<String>>>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self {
            endpoints: Arc::new(RwLock::new(HashMap::new())),
            call_count: Arc::new(RwLock::new(HashMap::new())),
            created: AtomicUsize::new(0),
            fail_predict: Arc::new(RwLock::new(false)),
            fail_teardown: Arc::new(RwLock::new(false)),
            fail_list: Arc::new(RwLock::new(false)),
            deploy_error: Arc::new(RwLock::new(None)),
        }
    }

    fn resource(endpoint_id: &str, display_name: &str, deployed: bool) -> EndpointResource {
        EndpointResource {
            name: format!(
                "projects/test-project/locations/us-central1/endpoints/{}",
                endpoint_id
            ),
            display_name: display_name.to_string(),
            create_time: Some(Utc::now()),
            deployed_models: if deployed {
                vec![DeployedModel {
                    id: "1".to_string(),
                    model: format!("models/{}", endpoint_id),
                    display_name: display_name.to_string(),
                }]
            } else {
                Vec::new()
            },
        }
    }

    pub async fn insert_endpoint(&self, endpoint_id: &str, display_name: &str, deployed: bool) {
        self.endpoints.write().await.insert(
            endpoint_id.to_string(),
            Self::resource(endpoint_id, display_name, deployed),
        );
    }

    /// Inserts an endpoint whose create time lies `age_secs` in the past.
    pub async fn insert_aged(&self, endpoint_id: &str, display_name: &str, age_secs: i64) {
        let mut resource = Self::resource(endpoint_id, display_name, false);
        resource.create_time = Some(Utc::now() - ChronoDuration::seconds(age_secs));
        self.endpoints
            .write()
            .await
            .insert(endpoint_id.to_string(), resource);
    }

    pub async fn contains(&self, endpoint_id: &str) -> bool {
        self.endpoints.read().await.contains_key(endpoint_id)
    }

    pub async fn endpoint_count(&self) -> usize {
        self.endpoints.read().await.len()
    }

    pub async fn calls(&self, method: &str) -> usize {
        self.call_count
            .read()
            .await
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    pub async fn set_fail_predict(&self, fail: bool) {
        *self.fail_predict.write().await = fail;
    }

    pub async fn set_fail_teardown(&self, fail: bool) {
        *self.fail_teardown.write().await = fail;
    }

    pub async fn set_fail_list(&self, fail: bool) {
        *self.fail_list.write().await = fail;
    }

    pub async fn set_deploy_error(&self, message: &str) {
        *self.deploy_error.write().await = Some(message.to_string());
    }

    async fn bump(&self, method: &str) {
        *self
            .call_count
            .write()
            .await
            .entry(method.to_string())
            .or_insert(0) += 1;
    }
}

#[async_trait]
impl EndpointProvisioner for MockProvisioner {
    async fn get_endpoint(&self, endpoint_id: &str) -> Result<EndpointResource> {
        self.bump("get_endpoint").await;
        self.endpoints
            .read()
            .await
            .get(endpoint_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Endpoint {} not found", endpoint_id)))
    }

    async fn create_endpoint(
        &self,
        display_name: &str,
        endpoint_id: Option<&str>,
    ) -> Result<EndpointResource> {
        self.bump("create_endpoint").await;
        let endpoint_id = match endpoint_id {
            Some(id) => id.to_string(),
            None => format!("gen-{}", self.created.fetch_add(1, Ordering::SeqCst)),
        };
        let resource = Self::resource(&endpoint_id, display_name, false);
        self.endpoints
            .write()
            .await
            .insert(endpoint_id, resource.clone());
        Ok(resource)
    }

    async fn deploy_model(&self, endpoint_id: &str, model_id: &str) -> Result<()> {
        self.bump("deploy_model").await;
        if let Some(message) = self.deploy_error.read().await.clone() {
            return Err(AppError::ProvisionError(message));
        }
        if let Some(endpoint) = self.endpoints.write().await.get_mut(endpoint_id) {
            endpoint.deployed_models.push(DeployedModel {
                id: "1".to_string(),
                model: format!("models/{}", model_id),
                display_name: "deployed".to_string(),
            });
        }
        Ok(())
    }

    async fn undeploy_all(&self, endpoint_id: &str) -> Result<()> {
        self.bump("undeploy_all").await;
        if *self.fail_teardown.read().await {
            return Err(AppError::ProvisionError("undeploy failed".to_string()));
        }
        if let Some(endpoint) = self.endpoints.write().await.get_mut(endpoint_id) {
            endpoint.deployed_models.clear();
        }
        Ok(())
    }

    async fn delete_endpoint(&self, endpoint_id: &str) -> Result<()> {
        self.bump("delete_endpoint").await;
        if *self.fail_teardown.read().await {
            return Err(AppError::ProvisionError("delete failed".to_string()));
        }
        self.endpoints.write().await.remove(endpoint_id);
        Ok(())
    }

    async fn list_endpoints(&self) -> Result<Vec<EndpointResource>> {
        self.bump("list_endpoints").await;
        if *self.fail_list.read().await {
            return Err(AppError::ProvisionError("list failed".to_string()));
        }
        Ok(self.endpoints.read().await.values().cloned().collect())
    }

    async fn predict(
        &self,
        endpoint_id: &str,
        _instances: Vec<Value>,
        _parameters: Value,
    ) -> Result<PredictResponse> {
        self.bump("predict").await;
        if *self.fail_predict.read().await {
            return Err(AppError::RemoteCallError(
                "Prediction request failed: connection reset".to_string(),
            ));
        }
        Ok(PredictResponse {
            predictions: vec![json!({
                "displayNames": ["grade_0", "grade_1"],
                "confidences": [0.92, 0.08],
            })],
            deployed_model_id: "1".to_string(),
            model: format!("models/{}", endpoint_id),
            model_display_name: "mock-model".to_string(),
            model_version_id: "1".to_string(),
        })
    }
}
