use std::sync::Arc;

use tracing::{error, info};

use crate::error::{AppError, Result};
use crate::models::ModelSpec;
use crate::vertex::types::EndpointResource;
use crate::vertex::EndpointProvisioner;

/// Create-or-attach glue around the provisioner: makes sure the well-known
/// endpoint for a model type exists and has a deployed model, then returns
/// the fresh resource.
pub struct ProvisioningService {
    provisioner: Arc<dyn EndpointProvisioner>,
}

impl ProvisioningService {
    pub fn new(provisioner: Arc<dyn EndpointProvisioner>) -> Self {
        Self { provisioner }
    }

    pub async fn ensure_deployed(
        &self,
        spec: &ModelSpec,
        endpoint_id: &str,
    ) -> Result<EndpointResource> {
        let endpoint = match self.provisioner.get_endpoint(endpoint_id).await {
            Ok(endpoint) => {
                if !endpoint.deployed_models.is_empty() {
                    info!("Endpoint {} already has deployed models", endpoint_id);
                    return Ok(endpoint);
                }
                info!(
                    "Endpoint {} exists but has no deployed models. Deploying model...",
                    endpoint_id
                );
                endpoint
            }
            Err(_) => {
                info!("Endpoint {} not found, creating it...", endpoint_id);
                self.provisioner
                    .create_endpoint(&spec.display_name, Some(endpoint_id))
                    .await?
            }
        };

        if let Err(e) = self
            .provisioner
            .deploy_model(endpoint.endpoint_id(), &spec.model_id)
            .await
        {
            error!("Error deploying model to endpoint: {}", e);
            return Err(classify_deploy_error(e));
        }
        self.provisioner.get_endpoint(endpoint.endpoint_id()).await
    }
}

/// Quota exhaustion hides in free-text deploy errors; detect it so callers
/// get a distinguishing message instead of a generic failure.
fn classify_deploy_error(error: AppError) -> AppError {
    let text = error.to_string().to_lowercase();
    if text.contains("quota") || text.contains("exceeded") || text.contains("limit") {
        return AppError::QuotaExceeded(format!(
            "{}. Please request a quota increase or clean up unused endpoints.",
            error
        ));
    }
    error
}
