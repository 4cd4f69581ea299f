//! On-demand Vertex AI endpoint pooling for the VExUS inference service.
//!
//! The crate keeps a small in-memory pool of deployed endpoints per model
//! type: requests reuse warm endpoints where possible, misses provision a
//! new one, and idle endpoints are reclaimed on a usage-adaptive timeout so
//! the project stays inside its endpoint quota.

use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pool;
pub mod routes;
pub mod services;
pub mod vertex;

// Re-export commonly used types
pub use error::{AppError, Result};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub env: Arc<config::Config>,
    pub registry: Arc<models::ModelRegistry>,
    pub provisioner: Arc<dyn vertex::EndpointProvisioner>,
    pub pool: Arc<pool::EndpointPool>,
    pub usage: Arc<pool::UsageTracker>,
    pub reclaim: Arc<pool::ReclaimScheduler>,
    pub quota: Arc<pool::QuotaGuard>,
}

impl AppState {
    /// Wires the pool core around a provisioner implementation.
    pub fn new(env: config::Config, provisioner: Arc<dyn vertex::EndpointProvisioner>) -> Self {
        let registry = Arc::new(models::ModelRegistry::bundled());
        let pool = Arc::new(pool::EndpointPool::new(
            provisioner.clone(),
            env.max_endpoints_per_type,
        ));
        let usage = Arc::new(pool::UsageTracker::new(
            Duration::from_secs(env.min_timeout_minutes * 60),
            Duration::from_secs(env.default_timeout_minutes * 60),
            Duration::from_secs(env.max_timeout_minutes * 60),
        ));
        let reclaim = Arc::new(pool::ReclaimScheduler::new(pool.clone()));
        let quota = Arc::new(pool::QuotaGuard::new(
            provisioner.clone(),
            pool.clone(),
            env.endpoint_quota_threshold,
        ));
        Self {
            env: Arc::new(env),
            registry,
            provisioner,
            pool,
            usage,
            reclaim,
            quota,
        }
    }
}
