use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fleetbook_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthExpired,
    AuthenticationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConfirmationRequired(String),
    ConflictError(String),
    UpstreamRejected(String),
    UpstreamUnavailable(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthExpired => (
                StatusCode::UNAUTHORIZED,
                "Credential expired or rejected, re-authenticate".to_string(),
            ),
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConfirmationRequired(msg) => (StatusCode::PRECONDITION_REQUIRED, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::UpstreamRejected(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::UpstreamUnavailable(msg) => {
                tracing::warn!("Upstream unavailable: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthExpired => AppError::AuthExpired,
            CoreError::NotFound(what) => AppError::NotFoundError(format!("Not found: {}", what)),
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            e @ CoreError::ConfirmationRequired(_) => AppError::ConfirmationRequired(e.to_string()),
            e @ CoreError::TransitionInFlight(_) => AppError::ConflictError(e.to_string()),
            e @ CoreError::TransitionRejected { .. } => AppError::UpstreamRejected(e.to_string()),
            e @ (CoreError::SourceUnavailable { .. } | CoreError::AvailabilityQueryFailed { .. }) => {
                AppError::UpstreamUnavailable(e.to_string())
            }
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}
