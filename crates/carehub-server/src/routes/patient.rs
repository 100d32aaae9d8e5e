//! `/patient`: doctor discovery, booking, prescriptions, family accounts
//! and the triage chat.
//!
//! Doctor and slot listings and the chat are public. Everything that reads
//! or writes a patient's records requires a bearer token whose holder is
//! the patient, their guardian, or staff.

use std::collections::HashMap;
use std::path::Path as FsPath;

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
    routing::{get, post},
};
use carehub_api::{ApiError, ApiResult};
use carehub_auth::{BearerAuth, UNUSABLE_PASSWORD};
use carehub_core::{available_slots, parse_date};
use carehub_storage::{
    AppointmentKind, AppointmentStatus, AppointmentStorage, NewAppointment, NewPrescription,
    OrderStatus, PrescriptionStorage, User, UserRole, UserStorage,
};
use chrono::{DateTime, Days, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    ConsultationRequest, book_consultation, book_lab_test, clinic_now, create_patient,
    format_time, load_patient, non_empty,
};
use crate::server::AppState;
use crate::services::{AuditAction, ChatReply, ChatTurn, NO_TEXT_PLACEHOLDER};

/// Shown instead of the OCR text when nothing was extracted.
const PROCESSING_PREVIEW: &str = "Image received, processing...";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_doctors))
        .route("/slots", get(list_slots))
        .route("/book_appointment", post(book_appointment))
        .route("/book_lab", post(book_lab))
        .route("/upload_prescription", post(upload_prescription))
        .route("/my_appointments/{patient_id}", get(my_appointments))
        .route("/my_prescriptions/{patient_id}", get(my_prescriptions))
        .route("/dependents", post(create_dependent))
        .route("/dependents/{guardian_id}", get(list_dependents))
        .route("/chat", post(chat))
}

// ---- Doctors & slots ----

#[derive(Debug, Deserialize)]
pub struct DoctorQuery {
    pub department: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: i64,
    pub full_name: String,
    pub department: Option<String>,
}

async fn list_doctors(
    State(state): State<AppState>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<Json<Vec<DoctorSummary>>> {
    let department = query.department.as_deref().filter(|d| !d.trim().is_empty());
    let doctors = state
        .storage
        .list_users_by_role(UserRole::Doctor, department)
        .await?
        .into_iter()
        .map(|d| DoctorSummary {
            id: d.id,
            full_name: d.full_name,
            department: d.department,
        })
        .collect();
    Ok(Json(doctors))
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub doctor_id: i64,
    pub date_str: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlotsResponse {
    pub slots: Vec<String>,
}

async fn list_slots(
    State(state): State<AppState>,
    Query(query): Query<SlotQuery>,
) -> ApiResult<Json<SlotsResponse>> {
    let date = parse_date(&query.date_str)?;
    let booked = state.storage.booked_times(query.doctor_id, date).await?;
    let slots = available_slots(date, &booked, clinic_now())
        .into_iter()
        .map(str::to_string)
        .collect();
    Ok(Json(SlotsResponse { slots }))
}

// ---- Booking ----

#[derive(Debug, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub date_str: String,
    pub time_slot: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: AppointmentKind,
    #[serde(default)]
    pub symptoms_summary: Option<String>,
}

pub(crate) fn default_kind() -> AppointmentKind {
    AppointmentKind::Clinic
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    pub message: String,
    pub id: i64,
    pub zoom_link: Option<String>,
}

async fn book_appointment(
    State(state): State<AppState>,
    BearerAuth(ctx): BearerAuth,
    Json(req): Json<BookAppointmentRequest>,
) -> ApiResult<Json<BookingResponse>> {
    let patient = load_patient(&state, &ctx, req.patient_id).await?;
    let appt = book_consultation(
        &state,
        &patient,
        ConsultationRequest {
            doctor_id: req.doctor_id,
            date_str: &req.date_str,
            time_slot: &req.time_slot,
            kind: req.kind,
            symptoms_summary: req.symptoms_summary,
        },
        ctx.user_id,
    )
    .await?;
    Ok(Json(BookingResponse {
        message: "Booking Successful".into(),
        id: appt.id,
        zoom_link: appt.zoom_link,
    }))
}

#[derive(Debug, Deserialize)]
pub struct BookLabRequest {
    pub patient_id: i64,
    pub test_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LabBookingResponse {
    pub message: String,
    pub test_name: String,
    pub id: i64,
}

/// Lab tests are scheduled for 09:00 on the next day.
fn next_lab_slot() -> chrono::NaiveDateTime {
    let today = clinic_now().date();
    let day = today.checked_add_days(Days::new(1)).unwrap_or(today);
    day.and_time(NaiveTime::MIN + chrono::Duration::hours(9))
}

async fn book_lab(
    State(state): State<AppState>,
    BearerAuth(ctx): BearerAuth,
    Json(req): Json<BookLabRequest>,
) -> ApiResult<Json<LabBookingResponse>> {
    non_empty("test_name", &req.test_name)?;
    let patient = load_patient(&state, &ctx, req.patient_id).await?;
    let test_name = req.test_name.trim().to_string();
    let appt = book_lab_test(
        &state,
        &patient,
        NewAppointment::lab_test(patient.id, &test_name, next_lab_slot()),
        ctx.user_id,
    )
    .await?;
    Ok(Json(LabBookingResponse {
        message: "Lab Test Booked".into(),
        test_name,
        id: appt.id,
    }))
}

// ---- Prescriptions ----

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub id: i64,
    pub extracted_preview: String,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(err.body_text())
    } else {
        ApiError::bad_request(err.body_text())
    }
}

/// Keeps ASCII letters, digits, dots, dashes and underscores.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

async fn store_upload(dir: &str, file_name: &str, bytes: &[u8]) -> std::io::Result<String> {
    tokio::fs::create_dir_all(dir).await?;
    let stored = format!("{}_{}", Uuid::new_v4().simple(), sanitize_file_name(file_name));
    tokio::fs::write(FsPath::new(dir).join(&stored), bytes).await?;
    Ok(stored)
}

async fn upload_prescription(
    State(state): State<AppState>,
    BearerAuth(ctx): BearerAuth,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut patient_id: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("patient_id") => patient_id = Some(field.text().await.map_err(multipart_error)?),
            Some("file") => {
                let name = field.file_name().unwrap_or("prescription").to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let patient_id: i64 = patient_id
        .ok_or_else(|| ApiError::bad_request("patient_id is required"))?
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request("patient_id must be an integer"))?;
    let (file_name, bytes) = file.ok_or_else(|| ApiError::bad_request("file is required"))?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("file is empty"));
    }

    let patient = load_patient(&state, &ctx, patient_id).await?;

    let text = state.ocr.extract(&bytes).await;
    let sealed = state
        .cipher
        .seal(if text.is_empty() { NO_TEXT_PLACEHOLDER } else { &text })?;

    let image_ref = match &state.config.server.upload_dir {
        Some(dir) => match store_upload(dir, &file_name, &bytes).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, dir = %dir, "Failed to keep prescription image");
                file_name.clone()
            }
        },
        None => file_name.clone(),
    };

    let rx = state
        .storage
        .create_prescription(NewPrescription {
            patient_id: patient.id,
            image_ref: Some(image_ref),
            extracted_data: sealed,
            status: OrderStatus::Preparing,
        })
        .await?;

    state
        .audit
        .record(
            AuditAction::UploadPrescription,
            Some(ctx.user_id),
            format!("Prescription #{} for patient #{}", rx.id, patient.id),
        )
        .await;

    Ok(Json(UploadResponse {
        message: "Prescription Received".into(),
        id: rx.id,
        extracted_preview: if text.is_empty() {
            PROCESSING_PREVIEW.to_string()
        } else {
            text
        },
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrescriptionView {
    pub id: i64,
    pub patient_id: i64,
    pub image_ref: Option<String>,
    /// Decrypted text.
    pub extracted_data: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Decrypts a stored prescription. Unreadable payloads (for example sealed
/// with a key that is no longer configured) are reported, not fatal.
pub(crate) fn prescription_view(
    state: &AppState,
    rx: carehub_storage::Prescription,
) -> PrescriptionView {
    let extracted_data = state.cipher.open(&rx.extracted_data).unwrap_or_else(|e| {
        tracing::warn!(prescription_id = rx.id, error = %e, "Failed to decrypt prescription");
        "[unreadable]".to_string()
    });
    PrescriptionView {
        id: rx.id,
        patient_id: rx.patient_id,
        image_ref: rx.image_ref,
        extracted_data,
        status: rx.status,
        created_at: rx.created_at,
    }
}

async fn my_prescriptions(
    State(state): State<AppState>,
    BearerAuth(ctx): BearerAuth,
    Path(patient_id): Path<i64>,
) -> ApiResult<Json<Vec<PrescriptionView>>> {
    let patient = load_patient(&state, &ctx, patient_id).await?;
    let prescriptions: Vec<PrescriptionView> = state
        .storage
        .list_patient_prescriptions(patient.id)
        .await?
        .into_iter()
        .map(|rx| prescription_view(&state, rx))
        .collect();

    state
        .audit
        .record(
            AuditAction::ViewPrescriptions,
            Some(ctx.user_id),
            format!("Viewed {} prescriptions of patient #{}", prescriptions.len(), patient.id),
        )
        .await;
    Ok(Json(prescriptions))
}

// ---- Appointments ----

#[derive(Debug, Serialize, Deserialize)]
pub struct MyAppointment {
    pub id: i64,
    pub doctor_name: String,
    pub time: String,
    pub zoom_link: Option<String>,
    pub status: AppointmentStatus,
    #[serde(rename = "type")]
    pub kind: AppointmentKind,
    pub test_name: Option<String>,
    pub lab_result: Option<String>,
    pub lab_report_url: Option<String>,
}

/// Resolves doctor names once per distinct doctor.
pub(crate) async fn doctor_names(
    state: &AppState,
    ids: impl Iterator<Item = i64>,
) -> ApiResult<HashMap<i64, String>> {
    let mut names = HashMap::new();
    for id in ids {
        if names.contains_key(&id) {
            continue;
        }
        if let Some(doctor) = state.storage.get_user(id).await? {
            names.insert(id, doctor.full_name);
        }
    }
    Ok(names)
}

async fn my_appointments(
    State(state): State<AppState>,
    BearerAuth(ctx): BearerAuth,
    Path(patient_id): Path<i64>,
) -> ApiResult<Json<Vec<MyAppointment>>> {
    let patient = load_patient(&state, &ctx, patient_id).await?;
    let appointments = state.storage.list_patient_appointments(patient.id).await?;
    let names = doctor_names(&state, appointments.iter().filter_map(|a| a.doctor_id)).await?;

    let views = appointments
        .into_iter()
        .map(|a| MyAppointment {
            id: a.id,
            doctor_name: match a.doctor_id {
                Some(id) => names.get(&id).cloned().unwrap_or_else(|| "Unknown".into()),
                None => "Lab Technician".into(),
            },
            time: format_time(a.appointment_time),
            zoom_link: a.zoom_link,
            status: a.status,
            kind: a.kind,
            test_name: a.test_name,
            lab_result: a.lab_result,
            lab_report_url: a.lab_report_url,
        })
        .collect();
    Ok(Json(views))
}

// ---- Family accounts ----

#[derive(Debug, Deserialize)]
pub struct DependentRequest {
    pub guardian_id: i64,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Dependents cannot log in: they get a placeholder email and no usable
/// password, and are managed through their guardian's token.
async fn create_dependent(
    State(state): State<AppState>,
    BearerAuth(ctx): BearerAuth,
    Json(req): Json<DependentRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    non_empty("full_name", &req.full_name)?;
    let guardian = load_patient(&state, &ctx, req.guardian_id).await?;
    if guardian.guardian_id.is_some() {
        return Err(ApiError::bad_request("A dependent cannot have dependents"));
    }

    let new_user = carehub_storage::NewUser::new(
        req.full_name.trim(),
        format!("dependent-{}@carehub.local", Uuid::new_v4().simple()),
        UNUSABLE_PASSWORD,
        UserRole::Patient,
    )
    .with_phone(req.phone.filter(|p| !p.trim().is_empty()))
    .with_guardian(guardian.id);
    let dependent = create_patient(&state, new_user).await?;

    state
        .audit
        .record(
            AuditAction::CreateDependent,
            Some(ctx.user_id),
            format!("Dependent #{} of patient #{}", dependent.id, guardian.id),
        )
        .await;
    Ok((StatusCode::CREATED, Json(dependent)))
}

async fn list_dependents(
    State(state): State<AppState>,
    BearerAuth(ctx): BearerAuth,
    Path(guardian_id): Path<i64>,
) -> ApiResult<Json<Vec<User>>> {
    let guardian = load_patient(&state, &ctx, guardian_id).await?;
    Ok(Json(state.storage.list_dependents(guardian.id).await?))
}

// ---- Triage chat ----

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Json<ChatReply> {
    Json(state.triage.respond(&req.message, &req.history).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("rx scan (1).png"), "rxscan1.png");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_file_name("???"), "upload");
    }

    #[test]
    fn lab_slot_is_tomorrow_morning() {
        let slot = next_lab_slot();
        assert_eq!(slot.time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert!(slot.date() > clinic_now().date());
    }
}
