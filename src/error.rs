use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Provisioning failed: {0}")]
    ProvisionError(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Prediction failed: {0}")]
    RemoteCallError(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalServerError(format!("JSON error: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "Invalid request", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", msg),
            AppError::ProvisionError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Provisioning failed", msg)
            }
            AppError::QuotaExceeded(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Quota exceeded", msg)
            }
            AppError::RemoteCallError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Prediction failed", msg)
            }
            AppError::InternalServerError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", msg)
            }
        };

        let body = Json(json!({
            "error": error,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
