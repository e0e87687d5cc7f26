//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use journal_core::domain::UserPreferences;
use journal_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::port_status;
use crate::web::middleware::session_id_from_headers;
use crate::web::state::AppState;

const SESSION_DAYS: i64 = 30;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    /// Where weekly summaries are mailed. Can be added later through the preferences.
    pub email: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub username: String,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn session_cookie(auth_session_id: &str) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id,
        Duration::days(SESSION_DAYS).num_seconds()
    )
}

/// Opens a fresh auth session for `user_id` and returns its cookie.
async fn open_session(state: &AppState, user_id: Uuid) -> Result<String, (StatusCode, String)> {
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);

    state
        .db
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
        })?;

    Ok(session_cookie(&auth_session_id))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
///
/// New accounts start with weekly summaries and email off, with Monday preselected.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request or username taken"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Username and password are required".to_string(),
        ));
    }
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })?
        .to_string();

    // 2. Create user in database
    let user = state
        .db
        .create_user(
            username,
            email,
            &password_hash,
            &UserPreferences::for_new_account(),
        )
        .await
        .map_err(|e| match e {
            PortError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            other => {
                error!("Failed to create user: {:?}", other);
                (port_status(&other), "Failed to create user".to_string())
            }
        })?;
    info!(user_id = %user.user_id, "Account created.");

    // 3. Open the session
    let cookie = open_session(&state, user.user_id).await?;

    let response = AuthResponse {
        user_id: user.user_id,
        username: user.username,
    };

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Get credentials by username
    let user_creds = state
        .db
        .get_user_credentials(req.username.trim())
        .await
        .map_err(|e| {
            error!("Failed to get user: {:?}", e);
            (StatusCode::UNAUTHORIZED, "Invalid username or password".to_string())
        })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();

    if !valid {
        return Err((StatusCode::UNAUTHORIZED, "Invalid username or password".to_string()));
    }

    // 3. Open the session
    let cookie = open_session(&state, user_creds.user_id).await?;

    let response = AuthResponse {
        user_id: user_creds.user_id,
        username: user_creds.username,
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id = session_id_from_headers(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .db
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
        })?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_lasts_thirty_days() {
        let cookie = session_cookie("abc");
        assert!(cookie.starts_with("session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("Max-Age=2592000"));
    }
}
