//! `IntoResponse` for `AuthError`: `{"detail": ...}` bodies, with a
//! `WWW-Authenticate` challenge on 401.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, detail) = error_details(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "Auth failure");
        } else {
            tracing::debug!(category = %self.category(), error = %self, "Request not authorized");
        }

        let mut response = (status, Json(json!({ "detail": detail }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

fn error_details(error: &AuthError) -> (StatusCode, String) {
    match error {
        AuthError::Unauthorized { message } => (StatusCode::UNAUTHORIZED, message.clone()),
        AuthError::InvalidToken { .. } => (
            StatusCode::UNAUTHORIZED,
            "Could not validate credentials".to_string(),
        ),
        AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token has expired".to_string()),
        AuthError::Forbidden { message } => (StatusCode::FORBIDDEN, message.clone()),
        AuthError::Internal { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    }
}
