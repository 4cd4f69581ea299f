use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{
    admin::{cleanup_handler, health_handler, quota_check_handler},
    ping::ping_handler,
    predict::predict_handler,
};
use crate::AppState;

/// Create the main API router with all endpoints
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        // Prediction path (warm or on-demand)
        .route("/predict/:vein_type", post(predict_handler))
        .route("/ping/:vein_type", post(ping_handler))
        // Pool administration
        .route("/health", get(health_handler))
        .route("/quota-check", get(quota_check_handler))
        .route("/cleanup", post(cleanup_handler))
}
