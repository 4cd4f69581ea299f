use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{error, info};

use crate::vertex::EndpointProvisioner;

/// One live backing endpoint tracked by the pool.
#[derive(Debug, Clone)]
pub struct EndpointHandle {
    pub endpoint_id: String,
    /// Opaque backing reference: the full
    /// `projects/{p}/locations/{l}/endpoints/{id}` resource name.
    pub resource_name: String,
    /// Basis for MRU selection, capacity eviction and reclamation deadlines.
    /// Set at creation and refreshed on every release, so idle deadlines are
    /// always measured from the most recent return to the pool.
    pub touched: Instant,
    /// Wall-clock twin of `touched`, reported by the admin surface.
    pub touched_utc: DateTime<Utc>,
    pub in_use: bool,
}

impl EndpointHandle {
    fn new(endpoint_id: &str, resource_name: &str) -> Self {
        Self {
            endpoint_id: endpoint_id.to_string(),
            resource_name: resource_name.to_string(),
            touched: Instant::now(),
            touched_utc: Utc::now(),
            in_use: true,
        }
    }
}

/// Snapshot row reported by the health and cleanup surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct HandleStatus {
    pub endpoint_id: String,
    pub created_at: String,
    pub in_use: bool,
}

/// Owns every live endpoint handle, grouped by model type. All mutation goes
/// through the single write lock; remote teardown calls are made only after
/// the victim's entry has been removed, never while the lock is held.
pub struct EndpointPool {
    provisioner: Arc<dyn EndpointProvisioner>,
    max_per_type: usize,
    handles: RwLock<HashMap<String, HashMap<String, EndpointHandle>>>,
}

impl EndpointPool {
    pub fn new(provisioner: Arc<dyn EndpointProvisioner>, max_per_type: usize) -> Self {
        Self {
            provisioner,
            max_per_type,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Hands out a free handle of the given type, preferring the most
    /// recently used one (likeliest to still be warm). The select-and-mark is
    /// one critical section, so a handle can never be served twice.
    pub async fn acquire(&self, model_type: &str) -> Option<String> {
        let mut handles = self.handles.write().await;
        let of_type = handles.get_mut(model_type)?;
        let endpoint_id = of_type
            .values()
            .filter(|handle| !handle.in_use)
            .max_by_key(|handle| handle.touched)
            .map(|handle| handle.endpoint_id.clone())?;
        if let Some(handle) = of_type.get_mut(&endpoint_id) {
            handle.in_use = true;
        }
        info!("Acquired endpoint {} for {}", endpoint_id, model_type);
        Some(endpoint_id)
    }

    /// Returns a handle to the pool and refreshes its timestamp, making it
    /// eligible again for both serving and reclamation. No-op if absent.
    pub async fn release(&self, model_type: &str, endpoint_id: &str) {
        let mut handles = self.handles.write().await;
        if let Some(handle) = handles
            .get_mut(model_type)
            .and_then(|of_type| of_type.get_mut(endpoint_id))
        {
            handle.in_use = false;
            handle.touched = Instant::now();
            handle.touched_utc = Utc::now();
            info!("Released endpoint {} back to the pool", endpoint_id);
        }
    }

    /// Registers a freshly provisioned endpoint, marked in use by the caller
    /// that provisioned it. If the type now exceeds its capacity, the oldest
    /// free handle of the type is torn down.
    pub async fn add(&self, model_type: &str, endpoint_id: &str, resource_name: &str) {
        let mut evicted = None;
        {
            let mut handles = self.handles.write().await;
            let of_type = handles.entry(model_type.to_string()).or_default();
            of_type.insert(
                endpoint_id.to_string(),
                EndpointHandle::new(endpoint_id, resource_name),
            );
            if of_type.len() > self.max_per_type {
                let oldest = of_type
                    .values()
                    .min_by_key(|handle| handle.touched)
                    .map(|handle| (handle.endpoint_id.clone(), handle.in_use));
                if let Some((oldest_id, oldest_in_use)) = oldest {
                    if oldest_id != endpoint_id && !oldest_in_use {
                        info!("Pool maintenance: removing oldest endpoint {}", oldest_id);
                        evicted = of_type.remove(&oldest_id);
                    }
                }
            }
        }
        if let Some(handle) = evicted {
            self.teardown(&handle).await;
        }
    }

    /// Idempotent teardown. The bookkeeping entry is dropped whether or not
    /// the remote delete succeeds: a leaked endpoint is recoverable, a
    /// blocked pool is not.
    pub async fn delete(&self, model_type: &str, endpoint_id: &str) {
        let removed = {
            let mut handles = self.handles.write().await;
            handles
                .get_mut(model_type)
                .and_then(|of_type| of_type.remove(endpoint_id))
        };
        match removed {
            Some(handle) => self.teardown(&handle).await,
            None => info!("No endpoint to delete for {}", model_type),
        }
    }

    /// Fire-time check for reclamation timers: the handle must still exist,
    /// be free, and have stayed untouched for the full timeout the timer was
    /// armed with. A release after arming refreshes `touched` and turns the
    /// stale timer into a no-op.
    pub async fn reclaim_if_expired(
        &self,
        model_type: &str,
        endpoint_id: &str,
        armed_timeout: Duration,
    ) -> bool {
        let removed = {
            let mut handles = self.handles.write().await;
            let Some(of_type) = handles.get_mut(model_type) else {
                return false;
            };
            match of_type.get(endpoint_id) {
                Some(handle) if !handle.in_use && handle.touched.elapsed() >= armed_timeout => {
                    of_type.remove(endpoint_id)
                }
                _ => None,
            }
        };
        match removed {
            Some(handle) => {
                info!(
                    "Reclaiming idle endpoint {} for {}",
                    endpoint_id, model_type
                );
                self.teardown(&handle).await;
                true
            }
            None => false,
        }
    }

    /// Removes the globally oldest free handle across every type, for
    /// preemptive quota defense. `None` when every managed handle is busy:
    /// in-flight work is never interrupted.
    pub async fn evict_oldest_free(&self) -> Option<(String, String)> {
        let removed = {
            let mut handles = self.handles.write().await;
            let victim = handles
                .iter()
                .flat_map(|(model_type, of_type)| {
                    of_type.values().map(move |handle| (model_type, handle))
                })
                .filter(|(_, handle)| !handle.in_use)
                .min_by_key(|(_, handle)| handle.touched)
                .map(|(model_type, handle)| (model_type.clone(), handle.endpoint_id.clone()));
            victim.and_then(|(model_type, endpoint_id)| {
                handles
                    .get_mut(&model_type)
                    .and_then(|of_type| of_type.remove(&endpoint_id))
                    .map(|handle| (model_type, handle))
            })
        };
        let (model_type, handle) = removed?;
        info!(
            "Preemptively evicting endpoint {} for {}",
            handle.endpoint_id, model_type
        );
        self.teardown(&handle).await;
        Some((model_type, handle.endpoint_id))
    }

    /// Force-deletes every handle not currently serving a request. Returns
    /// how many were removed.
    pub async fn cleanup_idle(&self) -> usize {
        let removed: Vec<EndpointHandle> = {
            let mut handles = self.handles.write().await;
            let mut victims = Vec::new();
            for of_type in handles.values_mut() {
                let free: Vec<String> = of_type
                    .values()
                    .filter(|handle| !handle.in_use)
                    .map(|handle| handle.endpoint_id.clone())
                    .collect();
                for endpoint_id in free {
                    if let Some(handle) = of_type.remove(&endpoint_id) {
                        victims.push(handle);
                    }
                }
            }
            victims
        };
        for handle in &removed {
            self.teardown(handle).await;
        }
        removed.len()
    }

    pub async fn total_count(&self) -> usize {
        self.handles
            .read()
            .await
            .values()
            .map(|of_type| of_type.len())
            .sum()
    }

    /// `(type, endpoint_id, in_use)` rows for the quota report.
    pub async fn managed(&self) -> Vec<(String, String, bool)> {
        let handles = self.handles.read().await;
        let mut rows: Vec<(String, String, bool)> = handles
            .iter()
            .flat_map(|(model_type, of_type)| {
                of_type.values().map(move |handle| {
                    (
                        model_type.clone(),
                        handle.endpoint_id.clone(),
                        handle.in_use,
                    )
                })
            })
            .collect();
        rows.sort();
        rows
    }

    pub async fn snapshot(&self) -> HashMap<String, Vec<HandleStatus>> {
        let handles = self.handles.read().await;
        handles
            .iter()
            .map(|(model_type, of_type)| {
                let mut rows: Vec<HandleStatus> = of_type
                    .values()
                    .map(|handle| HandleStatus {
                        endpoint_id: handle.endpoint_id.clone(),
                        created_at: handle.touched_utc.format("%Y-%m-%d %H:%M:%S").to_string(),
                        in_use: handle.in_use,
                    })
                    .collect();
                rows.sort_by(|a, b| a.endpoint_id.cmp(&b.endpoint_id));
                (model_type.clone(), rows)
            })
            .collect()
    }

    async fn teardown(&self, handle: &EndpointHandle) {
        if let Err(e) = self.provisioner.undeploy_all(&handle.endpoint_id).await {
            error!("Error undeploying {}: {}", handle.resource_name, e);
        }
        if let Err(e) = self.provisioner.delete_endpoint(&handle.endpoint_id).await {
            error!("Error deleting {}: {}", handle.resource_name, e);
            return;
        }
        info!("Deleted endpoint {} from pool", handle.endpoint_id);
    }
}
