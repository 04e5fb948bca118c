//! Error types for the identity service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::repositories::StoreError;

/// Failure of an identity operation.
///
/// `Authentication` and `Verification` carry fixed messages so a caller
/// cannot tell an unknown identifier from a wrong secret.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{0}")]
    Validation(String),

    #[error("wrong password")]
    Authentication,

    #[error("verify code not correct")]
    Verification,

    #[error("{0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdentityError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IdentityError::Validation(_) | IdentityError::Verification => StatusCode::BAD_REQUEST,
            IdentityError::Authentication => StatusCode::UNAUTHORIZED,
            IdentityError::NotFound(_) => StatusCode::NOT_FOUND,
            IdentityError::Persistence(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            IdentityError::Persistence(_) | IdentityError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand to a client
    pub fn public_message(&self) -> String {
        match self {
            IdentityError::Persistence(StoreError::Conflict(_)) => {
                "User already exists".to_string()
            }
            IdentityError::Persistence(_) | IdentityError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type IdentityResult<T> = Result<T, IdentityError>;

/// Error returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, malformed or expired bearer token
    #[error("Unauthorized")]
    Unauthorized,

    /// Malformed request body or query
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl ApiError {
    /// Status code and client-facing message, shared by both listeners
    pub fn into_parts(self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Identity(err) => {
                let status = err.status_code();
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!("Identity operation failed: {}", err);
                }
                (status, err.public_message())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.into_parts();

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            IdentityError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(IdentityError::Authentication.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(IdentityError::Verification.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            IdentityError::NotFound("User not found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            IdentityError::from(StoreError::Conflict("users_email_key".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            IdentityError::from(StoreError::Unexpected("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_fixed_messages() {
        assert_eq!(IdentityError::Authentication.to_string(), "wrong password");
        assert_eq!(IdentityError::Verification.to_string(), "verify code not correct");
        assert_eq!(
            IdentityError::Internal("signing key".into()).public_message(),
            "Internal server error"
        );
    }
}
