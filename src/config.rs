use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub project_id: String,
    pub location: String,
    pub port: u16,

    pub default_timeout_minutes: u64,
    pub min_timeout_minutes: u64,
    pub max_timeout_minutes: u64,

    pub max_endpoints_per_type: usize,
    pub endpoint_quota_threshold: usize,

    pub machine_type: String,
    pub request_timeout_secs: u64,
    pub deploy_timeout_secs: u64,
}

impl Config {
    pub fn init() -> Config {
        let project_id = std::env::var("PROJECT_ID")
            .expect("PROJECT_ID must be set");
        let location = std::env::var("LOCATION")
            .unwrap_or_else(|_| "us-central1".to_owned());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_owned())
            .parse::<u16>()
            .expect("PORT must be a number");

        let default_timeout_minutes = std::env::var("TIMEOUT_MINUTES")
            .unwrap_or_else(|_| "15".to_owned())
            .parse::<u64>()
            .expect("TIMEOUT_MINUTES must be a number");
        let min_timeout_minutes = std::env::var("MIN_TIMEOUT_MINUTES")
            .unwrap_or_else(|_| "5".to_owned())
            .parse::<u64>()
            .expect("MIN_TIMEOUT_MINUTES must be a number");
        let max_timeout_minutes = std::env::var("MAX_TIMEOUT_MINUTES")
            .unwrap_or_else(|_| "20".to_owned())
            .parse::<u64>()
            .expect("MAX_TIMEOUT_MINUTES must be a number");

        let max_endpoints_per_type = std::env::var("MAX_ENDPOINTS_PER_TYPE")
            .unwrap_or_else(|_| "2".to_owned())
            .parse::<usize>()
            .expect("MAX_ENDPOINTS_PER_TYPE must be a number");
        let endpoint_quota_threshold = std::env::var("ENDPOINT_QUOTA_THRESHOLD")
            .unwrap_or_else(|_| "8".to_owned())
            .parse::<usize>()
            .expect("ENDPOINT_QUOTA_THRESHOLD must be a number");

        let machine_type = std::env::var("MACHINE_TYPE")
            .unwrap_or_else(|_| "n1-standard-2".to_owned());
        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".to_owned())
            .parse::<u64>()
            .expect("REQUEST_TIMEOUT_SECS must be a number");
        let deploy_timeout_secs = std::env::var("DEPLOY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".to_owned())
            .parse::<u64>()
            .expect("DEPLOY_TIMEOUT_SECS must be a number");

        Config {
            project_id,
            location,
            port,
            default_timeout_minutes,
            min_timeout_minutes,
            max_timeout_minutes,
            max_endpoints_per_type,
            endpoint_quota_threshold,
            machine_type,
            request_timeout_secs,
            deploy_timeout_secs,
        }
    }
}
