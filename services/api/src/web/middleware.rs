//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;

/// Extracts the `session` cookie value from the request headers.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Parse session ID from the cookie header
    let auth_session_id = session_id_from_headers(req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    // 2. Validate auth session in database, get user_id
    let user_id = state
        .db
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to validate auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    // 3. Insert user_id into request extensions
    req.extensions_mut().insert(user_id);

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
