use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{error, info, warn};

use crate::pool::endpoint_pool::EndpointPool;
use crate::vertex::EndpointProvisioner;

/// Display-name marker of throwaway endpoints that may be deleted once stale.
const TEMP_MARKER: &str = "-temp";
const TEMP_MAX_AGE_SECS: i64 = 3600;

/// Defends the project-wide endpoint quota: counts every live endpoint the
/// provisioner can see (other consumers included) and preemptively evicts
/// when the count reaches the ceiling.
pub struct QuotaGuard {
    provisioner: Arc<dyn EndpointProvisioner>,
    pool: Arc<EndpointPool>,
    threshold: usize,
}

impl QuotaGuard {
    pub fn new(
        provisioner: Arc<dyn EndpointProvisioner>,
        pool: Arc<EndpointPool>,
        threshold: usize,
    ) -> Self {
        Self {
            provisioner,
            pool,
            threshold,
        }
    }

    /// Invoked on the acquire-miss path, before provisioning. Returns whether
    /// an eviction happened. All failures are swallowed: quota defense must
    /// never fail a request on its own.
    pub async fn check_and_evict(&self) -> bool {
        let endpoints = match self.provisioner.list_endpoints().await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                error!("Error checking quota availability: {}", e);
                return false;
            }
        };
        if endpoints.len() < self.threshold {
            return false;
        }
        warn!(
            "Approaching endpoint quota limit. Current count: {}",
            endpoints.len()
        );

        if self.pool.total_count().await > 0 {
            return match self.pool.evict_oldest_free().await {
                Some((model_type, endpoint_id)) => {
                    info!(
                        "Preemptively cleaned up endpoint {} for {}",
                        endpoint_id, model_type
                    );
                    true
                }
                // Every managed handle is serving a request; skip this pass.
                None => false,
            };
        }

        // Nothing managed here: fall back to stale throwaway endpoints left
        // behind by other consumers.
        let cutoff = Utc::now() - ChronoDuration::seconds(TEMP_MAX_AGE_SECS);
        let stale = endpoints
            .iter()
            .filter(|endpoint| endpoint.display_name.contains(TEMP_MARKER))
            .filter(|endpoint| endpoint.create_time.map_or(false, |created| created < cutoff))
            .min_by_key(|endpoint| endpoint.create_time);
        match stale {
            Some(endpoint) => {
                info!(
                    "Preemptively cleaning up old temporary endpoint: {}",
                    endpoint.display_name
                );
                match self.provisioner.delete_endpoint(endpoint.endpoint_id()).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!(
                            "Error deleting temporary endpoint {}: {}",
                            endpoint.endpoint_id(),
                            e
                        );
                        false
                    }
                }
            }
            None => false,
        }
    }
}
