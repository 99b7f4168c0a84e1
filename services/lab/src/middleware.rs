//! Session gate, admin gate and response headers

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderValue, Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use time::OffsetDateTime;
use tracing::{debug, error, warn};

use crate::{error::ApiError, models::Identity, state::AppState};

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session_token";

/// Resolve the session cookie and attach the caller's identity to the request
pub async fn require_authenticated(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .ok_or(ApiError::Unauthenticated)?;

    let identity = state
        .sessions
        .resolve_session(&token)
        .await
        .ok_or_else(|| {
            debug!("Rejected unknown or expired session for {}", req.uri().path());
            ApiError::Unauthenticated
        })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Let the request through only if the caller is an admin right now
///
/// Must run inside [`require_authenticated`].
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .cloned()
        .ok_or(ApiError::MissingIdentity)?;

    match state.credentials.admin_flag(identity.user_id).await {
        Ok(Some(true)) => Ok(next.run(req).await),
        Ok(_) => {
            warn!(
                "User {} denied access to {}",
                identity.username,
                req.uri().path()
            );
            Err(ApiError::NotPermitted)
        }
        Err(e) => {
            error!("Failed to read admin flag of user {}: {}", identity.user_id, e);
            Err(ApiError::NotPermitted)
        }
    }
}

/// Identity attached by [`require_authenticated`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or(ApiError::MissingIdentity)
    }
}

/// Add the standard hardening headers to every response
pub async fn security_headers(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer-when-downgrade"),
    );
    if state.cookie_secure {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}

/// Session cookie expiring together with the session
pub fn session_cookie(token: String, expires_at: DateTime<Utc>, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .build();

    if let Ok(expires) = OffsetDateTime::from_unix_timestamp(expires_at.timestamp()) {
        cookie.set_expires(expires);
    }

    cookie
}

/// Already-expired session cookie that makes the browser drop it
pub fn expired_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .max_age(time::Duration::ZERO)
        .build()
}
