//! `/auth`: patient self-registration and login for every role.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use carehub_api::{ApiError, ApiResult};
use carehub_auth::{hash_password_async, verify_password_async};
use carehub_storage::{NewUser, UserRole, UserStorage};
use serde::{Deserialize, Serialize};

use super::{create_patient, non_empty};
use crate::server::AppState;
use crate::services::AuditAction;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub patient_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub role: UserRole,
    /// `PAT-` identifier; `None` for staff.
    pub patient_id: Option<String>,
    pub user_name: String,
    pub id: i64,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    non_empty("full_name", &req.full_name)?;
    non_empty("password", &req.password)?;
    let email = req.email.trim();
    if !email.contains('@') {
        return Err(ApiError::bad_request("email is not a valid address"));
    }
    if state.storage.find_user_by_email(email).await?.is_some() {
        return Err(ApiError::conflict("Email already registered"));
    }

    let phone = req.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
    let new_user = NewUser::new(
        req.full_name.trim(),
        email,
        hash_password_async(req.password).await?,
        UserRole::Patient,
    )
    .with_phone(phone);
    let user = create_patient(&state, new_user).await?;
    let patient_uid = user.patient_uid.clone().unwrap_or_default();

    state
        .audit
        .record(
            AuditAction::Register,
            Some(user.id),
            format!("Registered patient {patient_uid}"),
        )
        .await;
    tracing::info!(user_id = user.id, patient_uid = %patient_uid, "Patient registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful".into(),
            patient_id: patient_uid,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError::unauthorized("Invalid credentials");
    let user = state
        .storage
        .find_user_by_email(req.email.trim())
        .await?
        .ok_or_else(invalid)?;
    if !verify_password_async(req.password, user.password_hash.clone()).await {
        return Err(invalid());
    }

    let (access_token, _claims) =
        state
            .auth
            .jwt_service
            .issue_access_token(user.id, &user.email, user.role)?;

    state
        .audit
        .record(AuditAction::Login, Some(user.id), format!("Login as {}", user.role))
        .await;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".into(),
        role: user.role,
        patient_id: user.patient_uid,
        user_name: user.full_name,
        id: user.id,
    }))
}
