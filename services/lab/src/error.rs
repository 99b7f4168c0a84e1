//! Custom error types for the lab service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{account::AccountError, booking::BookingError, credentials::AuthError};

/// HTTP-facing error of the lab service
#[derive(Error, Debug)]
pub enum ApiError {
    /// No valid session; sent to the login page
    #[error("Authentication required")]
    Unauthenticated,

    /// Not admin, not owner or not granted; sent to a neutral page
    #[error("Not permitted")]
    NotPermitted,

    /// Login rejected for bad credentials
    #[error("{0}")]
    LoginFailed(String),

    /// Login rejected because of account state
    #[error("{0}")]
    AccountBlocked(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A guarded handler ran without the identity its guard attaches
    #[error("Identity missing from request")]
    MissingIdentity,

    #[error("Internal server error")]
    InternalServerError,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Unauthenticated => return Redirect::to("/login").into_response(),
            ApiError::NotPermitted => return Redirect::to("/").into_response(),
            ApiError::LoginFailed(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::AccountBlocked(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::MissingIdentity => {
                error!("Guarded handler reached without an identity; check the route layers");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            ApiError::Database(e) => {
                error!("Storage failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::LoginFailed(err.to_string()),
            AuthError::PendingApproval | AuthError::AccountDisabled => {
                ApiError::AccountBlocked(err.to_string())
            }
            AuthError::MissingFields
            | AuthError::PasswordMismatch
            | AuthError::IncorrectCurrentPassword
            | AuthError::Validation(_) => ApiError::BadRequest(err.to_string()),
            AuthError::UsernameTaken => ApiError::Conflict(err.to_string()),
            AuthError::UserNotFound => ApiError::NotFound(err.to_string()),
            AuthError::Hashing(_) | AuthError::Session(_) => {
                error!("Authentication failure: {}", err);
                ApiError::InternalServerError
            }
            AuthError::Storage(e) => ApiError::Database(e),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::InvalidRange | BookingError::Validation(_) => {
                ApiError::BadRequest(err.to_string())
            }
            BookingError::SlotTaken => ApiError::Conflict(err.to_string()),
            BookingError::Forbidden => ApiError::NotPermitted,
            BookingError::NotFound => ApiError::NotFound(err.to_string()),
            BookingError::Storage(e) => ApiError::Database(e),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(msg) => ApiError::BadRequest(msg),
            AccountError::NotFound => ApiError::NotFound(err.to_string()),
            AccountError::Storage(e) => ApiError::Database(e),
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    #[test]
    fn test_gate_failures_redirect() {
        let response = ApiError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/login");

        let response = ApiError::from(BookingError::Forbidden).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/");
    }

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (ApiError::from(BookingError::SlotTaken), StatusCode::CONFLICT),
            (ApiError::from(BookingError::InvalidRange), StatusCode::BAD_REQUEST),
            (ApiError::from(BookingError::NotFound), StatusCode::NOT_FOUND),
            (ApiError::from(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (ApiError::from(AuthError::PendingApproval), StatusCode::FORBIDDEN),
            (ApiError::from(AuthError::UsernameTaken), StatusCode::CONFLICT),
            (ApiError::from(AuthError::UserNotFound), StatusCode::NOT_FOUND),
            (
                ApiError::from(DatabaseError::Migration("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
