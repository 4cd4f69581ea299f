#![allow(dead_code)]

pub mod mocks;

use std::sync::Arc;

use vexus_ondemand::config::Config;
use vexus_ondemand::vertex::EndpointProvisioner;
use vexus_ondemand::AppState;

/// Config used by every test: production defaults, fast remote timeouts.
pub fn test_config() -> Config {
    Config {
        project_id: "test-project".to_string(),
        location: "us-central1".to_string(),
        port: 0,
        default_timeout_minutes: 15,
        min_timeout_minutes: 5,
        max_timeout_minutes: 20,
        max_endpoints_per_type: 2,
        endpoint_quota_threshold: 8,
        machine_type: "n1-standard-2".to_string(),
        request_timeout_secs: 5,
        deploy_timeout_secs: 5,
    }
}

pub fn state_with(provisioner: Arc<dyn EndpointProvisioner>) -> AppState {
    AppState::new(test_config(), provisioner)
}
