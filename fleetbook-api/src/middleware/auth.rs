use axum::{extract::Request, middleware::Next, response::Response};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};

use crate::error::AppError;

// ============================================================================
// Operator Bearer Middleware
// ============================================================================

/// Every `/v1` route needs an operator credential. The token itself is
/// validated by the remote backend on calls made with it.
pub async fn require_bearer(req: Request, next: Next) -> Result<Response, AppError> {
    // 1. Extract token from Authorization header
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer credential".to_string()))?;

    // 2. Reject blank tokens
    if bearer.token().trim().is_empty() {
        return Err(AppError::AuthenticationError("Empty bearer credential".to_string()));
    }

    Ok(next.run(req).await)
}
