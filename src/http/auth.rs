//! Token-presence authentication.
//!
//! Any non-empty `X-Admin-Token` or `X-User-Token` header is accepted;
//! requests carrying neither are rejected with 401. Token validation proper
//! is out of scope here and would live behind these header checks.

use axum::{extract::Request, middleware::Next, response::Response};

use super::handlers::ApiError;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";
pub const USER_TOKEN_HEADER: &str = "x-user-token";

pub async fn require_token(request: Request, next: Next) -> Result<Response, ApiError> {
    let has_token = [ADMIN_TOKEN_HEADER, USER_TOKEN_HEADER].iter().any(|name| {
        request
            .headers()
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| !v.is_empty())
    });

    if !has_token {
        return Err(ApiError::unauthorized("authentication required"));
    }

    Ok(next.run(request).await)
}
