//! Login, registration, logout and password change

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    error::ApiResult,
    middleware::{CurrentUser, SESSION_COOKIE, expired_session_cookie, session_cookie},
    state::AppState,
};

/// Request for user login
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response for user login
#[derive(Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Request for account registration
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub confirm: String,
}

/// Request for password change
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<LoginResponse>)> {
    info!("Login attempt for user: {}", payload.username);

    let session = state
        .accounts
        .login(payload.username.trim(), &payload.password)
        .await?;

    let response = LoginResponse {
        user_id: session.user_id,
        username: session.username.clone(),
        expires_at: session.expires_at,
    };
    let cookie = session_cookie(session.token, session.expires_at, state.cookie_secure);

    Ok((jar.add(cookie), Json(response)))
}

/// Account registration endpoint; new accounts wait for admin approval
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .credentials
        .register(&payload.username, &payload.password, &payload.confirm)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user_id": user.id,
            "username": user.username,
            "status": "pending_approval",
        })),
    ))
}

/// Logout endpoint; clears the cookie even without a valid session
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.accounts.logout(cookie.value()).await;
    }

    (
        jar.add(expired_session_cookie(state.cookie_secure)),
        Json(json!({ "message": "Logged out" })),
    )
}

/// Password change endpoint for the signed-in user
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .credentials
        .change_password(
            identity.user_id,
            &payload.current_password,
            &payload.new_password,
            &payload.confirm_password,
        )
        .await?;

    Ok(Json(json!({ "message": "Password changed successfully" })))
}
