//! Unified API error handling.
//!
//! Every failure is classified here, at the boundary. Errors are returned as
//! `{"error": {"code", "message"}}` with the status of their code, except
//! upstream failures, which mirror GitHub's status with an empty body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use crate::db::StoreError;
use crate::github::{shape::ShapeError, GatewayError, OAuthError, SourceError};

/// Error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Client errors (4xx)
    BadRequest,
    /// No signed token, or one that fails verification
    Unauthenticated,
    /// Verified caller does not own the referenced credential
    Unauthorized,
    NotFound,

    // Upstream and server errors
    UpstreamError,
    TransportFailure,
    InternalError,
    DatabaseError,
}

impl ErrorCode {
    /// Get the default HTTP status code for this error code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            ErrorCode::TransportFailure => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::NotFound => "not_found",
            ErrorCode::UpstreamError => "upstream_error",
            ErrorCode::TransportFailure => "transport_failure",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::DatabaseError => "database_error",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.status_code(),
            code,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthenticated, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// GitHub answered with a non-200 status; that status is passed through.
    pub fn upstream(status: StatusCode) -> Self {
        Self::new(ErrorCode::UpstreamError, format!("GitHub returned {}", status))
            .with_status(status)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransportFailure, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.code == ErrorCode::UpstreamError {
            return self.status.into_response();
        }

        let response = ErrorResponse {
            error: ErrorBody {
                code: self.code.as_str().to_string(),
                message: self.message,
            },
        };

        (self.status, Json(response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

// -------------------------------------------------------------------------
// Conversions from module errors
// -------------------------------------------------------------------------

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        ApiError::database("A database error occurred")
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::not_found("Github token not found."),
            StoreError::Unauthorized => {
                ApiError::unauthorized("Token client key does not match account client key.")
            }
            StoreError::Database(e) => e.into(),
            StoreError::Crypto(e) => {
                tracing::error!("Stored token could not be decrypted: {}", e);
                ApiError::internal("Stored token could not be read")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Missing => ApiError::unauthenticated("Authorization token not specified."),
            AuthError::Invalid(reason) => {
                tracing::warn!(reason = %reason, "Rejected signed token");
                ApiError::unauthenticated("Invalid authorization token.")
            }
            AuthError::UnknownIssuer => {
                tracing::warn!("Rejected signed token from unknown issuer");
                ApiError::unauthenticated("Invalid authorization token.")
            }
            AuthError::Store(e) => e.into(),
        }
    }
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        tracing::error!(error = %err, "Caught exception fetching url");
        ApiError::transport("Failed to reach GitHub")
    }
}

impl From<ShapeError> for ApiError {
    fn from(err: ShapeError) -> Self {
        tracing::error!(error = %err, "Unexpected GitHub payload");
        ApiError::new(ErrorCode::UpstreamError, err.to_string()).with_status(StatusCode::BAD_GATEWAY)
    }
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::Transport(e) => GatewayError::Transport(e).into(),
            OAuthError::Upstream(status) => ApiError::upstream(status),
            OAuthError::Rejected(reason) => {
                tracing::warn!(reason = %reason, "GitHub rejected the authorization code");
                ApiError::upstream(StatusCode::BAD_GATEWAY)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_codes() {
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::TransportFailure.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_upstream_status_is_passed_through() {
        let err = ApiError::upstream(StatusCode::NOT_FOUND);
        assert_eq!(err.code(), ErrorCode::UpstreamError);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_store_errors_classify() {
        assert_eq!(ApiError::from(StoreError::NotFound).code(), ErrorCode::NotFound);
        assert_eq!(
            ApiError::from(StoreError::Unauthorized).code(),
            ErrorCode::Unauthorized
        );
    }

    #[test]
    fn test_auth_errors_are_unauthenticated() {
        assert_eq!(ApiError::from(AuthError::Missing).code(), ErrorCode::Unauthenticated);
        assert_eq!(
            ApiError::from(AuthError::Invalid("bad signature".into())).code(),
            ErrorCode::Unauthenticated
        );
        assert_eq!(
            ApiError::from(AuthError::UnknownIssuer).code(),
            ErrorCode::Unauthenticated
        );
    }

    #[test]
    fn test_source_errors_are_bad_requests() {
        let err = ApiError::from(SourceError::UnrecognizedUrl);
        assert_eq!(err.code(), ErrorCode::BadRequest);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
