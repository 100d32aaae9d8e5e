//! HTTP-facing error taxonomy for the CareHub API.
//!
//! Every error renders as `{"detail": "<message>"}` with the matching
//! status code. Server-side failures are logged and their details hidden.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use carehub_auth::{AuthError, JwtError};
use carehub_core::CoreError;
use carehub_secrets::SecretsError;
use carehub_storage::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
}

/// High-level API errors mapped to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::PayloadTooLarge(msg.into())
    }
    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the client.
    pub fn detail(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Internal(_) => "Internal server error",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            detail: self.detail().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let mut response = (status, Json(self.to_body())).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        tracing::debug!(category = %err.category(), error = %err, "Storage operation failed");
        match &err {
            StorageError::NotFound { .. } => ApiError::not_found(err.to_string()),
            StorageError::AlreadyExists { field: "email", .. } => {
                ApiError::conflict("Email already registered")
            }
            StorageError::AlreadyExists { .. }
            | StorageError::SlotTaken { .. }
            | StorageError::InvalidTransition { .. } => ApiError::conflict(err.to_string()),
            StorageError::InvalidInput { message } => ApiError::bad_request(message.clone()),
            StorageError::ConnectionError { .. } => ApiError::service_unavailable(err.to_string()),
            StorageError::Internal { .. } => ApiError::internal(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized { message } => ApiError::unauthorized(message),
            AuthError::InvalidToken { .. } => ApiError::unauthorized("Could not validate credentials"),
            AuthError::TokenExpired => ApiError::unauthorized("Token has expired"),
            AuthError::Forbidden { message } => ApiError::forbidden(message),
            other @ AuthError::Internal { .. } => {
                ApiError::internal(other.to_string())
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        if err.is_client_error() {
            ApiError::bad_request(err.to_string())
        } else {
            ApiError::internal(err.to_string())
        }
    }
}

/// Token issuance failures are server-side; decoding goes through `AuthError`.
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        ApiError::internal(err.to_string())
    }
}

impl From<SecretsError> for ApiError {
    fn from(err: SecretsError) -> Self {
        ApiError::internal(err.to_string())
    }
}

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_response_sets_status_and_challenge() {
        let resp = ApiError::unauthorized("Invalid credentials").into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let resp = ApiError::not_found("nope").into_response();
        assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn internal_details_are_hidden() {
        let err = ApiError::internal("connection string leaked");
        assert_eq!(err.to_body().detail, "Internal server error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn storage_errors_map_to_status() {
        let time = chrono::NaiveDate::from_ymd_opt(2099, 1, 1)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap();
        let cases: Vec<(StorageError, StatusCode)> = vec![
            (StorageError::not_found("user", 7), StatusCode::NOT_FOUND),
            (
                StorageError::already_exists("user", "email", "a@b.c"),
                StatusCode::CONFLICT,
            ),
            (StorageError::slot_taken(3, time), StatusCode::CONFLICT),
            (
                StorageError::invalid_transition("ready", "processing"),
                StatusCode::CONFLICT,
            ),
            (StorageError::invalid_input("bad"), StatusCode::BAD_REQUEST),
            (
                StorageError::internal("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[tokio::test]
    async fn body_is_detail_object() {
        let resp = ApiError::conflict("Slot already booked").into_response();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({"detail": "Slot already booked"}));
    }

    #[test]
    fn duplicate_email_has_friendly_detail() {
        let err = ApiError::from(StorageError::already_exists("user", "email", "a@b.c"));
        assert_eq!(err.detail(), "Email already registered");
    }

    #[test]
    fn auth_and_core_errors_map_to_status() {
        assert_eq!(
            ApiError::from(AuthError::forbidden("no")).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(AuthError::TokenExpired).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(CoreError::invalid_date("x")).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
