use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::pool::endpoint_pool::EndpointPool;

/// Arms one deferred reclamation task per add/release. The tasks ride the
/// runtime's timer wheel instead of blocking a thread each, and there is no
/// cancel bookkeeping: a timer that fires after its handle was reacquired or
/// re-released fails the pool's fire-time check and dies as a no-op.
pub struct ReclaimScheduler {
    pool: Arc<EndpointPool>,
}

impl ReclaimScheduler {
    pub fn new(pool: Arc<EndpointPool>) -> Self {
        Self { pool }
    }

    pub fn arm(&self, model_type: &str, endpoint_id: &str, timeout: Duration) {
        let pool = self.pool.clone();
        let model_type = model_type.to_string();
        let endpoint_id = endpoint_id.to_string();
        debug!("Scheduling cleanup for {} in {:?}", model_type, timeout);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if pool.reclaim_if_expired(&model_type, &endpoint_id, timeout).await {
                info!(
                    "Idle timeout reached for {}, endpoint {} reclaimed",
                    model_type, endpoint_id
                );
            }
        });
    }
}
