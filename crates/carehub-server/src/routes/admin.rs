//! `/admin`: staff dashboards, status updates and front-desk bookings.
//!
//! | Endpoint                 | Roles                          |
//! |--------------------------|--------------------------------|
//! | `GET appointments`       | admin, doctor, lab             |
//! | `GET pharmacy_queue`     | admin, pharmacist              |
//! | `POST update_status`     | depends on `item_type`         |
//! | `GET patients`           | admin                          |
//! | `POST book_appointment`  | admin                          |
//! | `POST book_lab`          | admin, lab                     |
//! | `GET audit_logs`         | admin                          |

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use carehub_api::{ApiError, ApiResult};
use carehub_auth::{AdminAuth, AuthContext, BearerAuth, StaffAuth};
use carehub_storage::{
    AppointmentKind, AppointmentStatus, AppointmentStorage, AppointmentUpdate, AuditLog,
    NewAppointment, OrderStatus, PrescriptionStorage, UserRole, UserStorage,
};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::patient::{PrescriptionView, default_kind, doctor_names, prescription_view};
use super::{
    ConsultationRequest, book_consultation, book_lab_test, bookable_slot, clinic_now, format_time,
    non_empty, walk_in_patient,
};
use crate::server::AppState;
use crate::services::{AuditAction, PharmacyOrder};

const APPOINTMENT_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Doctor, UserRole::Lab];
const PHARMACY_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Pharmacist];
const LAB_BOOKING_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Lab];

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments))
        .route("/pharmacy_queue", get(pharmacy_queue))
        .route("/update_status", post(update_status))
        .route("/patients", get(list_patients))
        .route("/book_appointment", post(book_walk_in))
        .route("/book_lab", post(book_walk_in_lab))
        .route("/audit_logs", get(audit_logs))
}

// ---- Dashboards ----

#[derive(Debug, Serialize, Deserialize)]
pub struct AppointmentRow {
    pub id: i64,
    pub patient_id: i64,
    pub patient_name: String,
    pub patient_phone: Option<String>,
    pub patient_uid: Option<String>,
    pub doctor_id: Option<i64>,
    pub doctor_name: String,
    pub appointment_time: String,
    pub status: AppointmentStatus,
    #[serde(rename = "type")]
    pub kind: AppointmentKind,
    pub zoom_link: Option<String>,
    pub symptoms_summary: Option<String>,
    pub test_name: Option<String>,
    pub lab_result: Option<String>,
    pub lab_report_url: Option<String>,
}

async fn list_appointments(
    State(state): State<AppState>,
    StaffAuth(ctx): StaffAuth,
) -> ApiResult<Json<Vec<AppointmentRow>>> {
    ctx.require_any(APPOINTMENT_ROLES)?;
    let appointments = state.storage.list_appointments().await?;
    let doctors = doctor_names(&state, appointments.iter().filter_map(|a| a.doctor_id)).await?;

    let mut rows = Vec::with_capacity(appointments.len());
    for appt in appointments {
        let patient = state.storage.get_user(appt.patient_id).await?;
        rows.push(AppointmentRow {
            id: appt.id,
            patient_id: appt.patient_id,
            patient_name: patient
                .as_ref()
                .map(|p| p.full_name.clone())
                .unwrap_or_else(|| "Unknown".into()),
            patient_phone: patient.as_ref().and_then(|p| p.phone.clone()),
            patient_uid: patient.and_then(|p| p.patient_uid),
            doctor_id: appt.doctor_id,
            doctor_name: match appt.doctor_id {
                Some(id) => doctors.get(&id).cloned().unwrap_or_else(|| "Unknown".into()),
                None => "Lab Technician".into(),
            },
            appointment_time: format_time(appt.appointment_time),
            status: appt.status,
            kind: appt.kind,
            zoom_link: appt.zoom_link,
            symptoms_summary: appt.symptoms_summary,
            test_name: appt.test_name,
            lab_result: appt.lab_result,
            lab_report_url: appt.lab_report_url,
        });
    }
    Ok(Json(rows))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueuedPrescription {
    #[serde(flatten)]
    pub prescription: PrescriptionView,
    pub patient_name: String,
    pub patient_phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PharmacyQueue {
    pub prescriptions: Vec<QueuedPrescription>,
    pub orders: Vec<PharmacyOrder>,
}

async fn pharmacy_queue(
    State(state): State<AppState>,
    StaffAuth(ctx): StaffAuth,
) -> ApiResult<Json<PharmacyQueue>> {
    ctx.require_any(PHARMACY_ROLES)?;
    let mut prescriptions = Vec::new();
    for rx in state.storage.list_prescriptions().await? {
        let patient = state.storage.get_user(rx.patient_id).await?;
        prescriptions.push(QueuedPrescription {
            prescription: prescription_view(&state, rx),
            patient_name: patient
                .as_ref()
                .map(|p| p.full_name.clone())
                .unwrap_or_else(|| "Unknown".into()),
            patient_phone: patient.and_then(|p| p.phone),
        });
    }
    Ok(Json(PharmacyQueue {
        prescriptions,
        orders: state.orders.list(),
    }))
}

// ---- Status updates ----

#[derive(Debug, Deserialize)]
pub struct StatusUpdateQuery {
    pub item_type: String,
    pub item_id: i64,
    #[serde(default)]
    pub new_status: Option<String>,
    #[serde(default)]
    pub new_date: Option<String>,
    #[serde(default)]
    pub new_time: Option<String>,
    #[serde(default)]
    pub new_result: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdateResponse {
    pub message: String,
    pub item_type: String,
    pub item_id: i64,
    pub status: String,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required_status(query: &StatusUpdateQuery) -> ApiResult<&str> {
    present(&query.new_status).ok_or_else(|| ApiError::bad_request("new_status is required"))
}

async fn update_appointment(
    state: &AppState,
    ctx: &AuthContext,
    query: &StatusUpdateQuery,
) -> ApiResult<String> {
    ctx.require_any(APPOINTMENT_ROLES)?;
    let mut update = AppointmentUpdate {
        status: present(&query.new_status)
            .map(str::parse::<AppointmentStatus>)
            .transpose()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
        lab_result: present(&query.new_result).map(str::to_string),
        ..Default::default()
    };
    match (present(&query.new_date), present(&query.new_time)) {
        (Some(date), Some(time)) => update.appointment_time = Some(bookable_slot(date, time)?),
        (None, None) => {}
        _ => {
            return Err(ApiError::bad_request(
                "new_date and new_time must be given together",
            ));
        }
    }
    if update.is_empty() {
        return Err(ApiError::bad_request("Nothing to update"));
    }
    let appt = state.storage.update_appointment(query.item_id, update).await?;
    Ok(appt.status.to_string())
}

async fn update_status(
    State(state): State<AppState>,
    BearerAuth(ctx): BearerAuth,
    Query(query): Query<StatusUpdateQuery>,
) -> ApiResult<Json<StatusUpdateResponse>> {
    let (kind, status) = match query.item_type.trim().to_ascii_lowercase().as_str() {
        "appointment" => ("Appointment", update_appointment(&state, &ctx, &query).await?),
        "prescription" => {
            ctx.require_any(PHARMACY_ROLES)?;
            let status = parse_order_status(required_status(&query)?)?;
            let rx = state
                .storage
                .update_prescription_status(query.item_id, status)
                .await?;
            ("Prescription", rx.status.to_string())
        }
        "order" => {
            ctx.require_any(PHARMACY_ROLES)?;
            let status = parse_order_status(required_status(&query)?)?;
            let order = state.orders.update_status(query.item_id, status)?;
            ("Order", order.status.to_string())
        }
        other => {
            return Err(ApiError::bad_request(format!(
                "Unknown item_type '{other}', expected appointment, prescription or order"
            )));
        }
    };

    // The write above is authoritative; delivery is best-effort.
    let message = format!("{kind} #{} is now {status}", query.item_id);
    let delivered = state.broadcaster.publish_status(message.clone());
    tracing::info!(item_id = query.item_id, kind, status = %status, delivered, "Status updated");
    state
        .audit
        .record(AuditAction::UpdateStatus, Some(ctx.user_id), message)
        .await;

    Ok(Json(StatusUpdateResponse {
        message: "Status updated".into(),
        item_type: kind.to_ascii_lowercase(),
        item_id: query.item_id,
        status,
    }))
}

fn parse_order_status(value: &str) -> ApiResult<OrderStatus> {
    value
        .parse::<OrderStatus>()
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

// ---- Patients & walk-ins ----

#[derive(Debug, Serialize, Deserialize)]
pub struct PatientRow {
    pub id: i64,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: String,
    pub patient_uid: Option<String>,
    pub guardian_id: Option<i64>,
    pub is_gold_member: bool,
    pub created_at: DateTime<Utc>,
}

async fn list_patients(
    State(state): State<AppState>,
    AdminAuth(_ctx): AdminAuth,
) -> ApiResult<Json<Vec<PatientRow>>> {
    let patients = state
        .storage
        .list_users_by_role(UserRole::Patient, None)
        .await?
        .into_iter()
        .map(|p| PatientRow {
            id: p.id,
            full_name: p.full_name,
            phone: p.phone,
            email: p.email,
            patient_uid: p.patient_uid,
            guardian_id: p.guardian_id,
            is_gold_member: p.is_gold_member,
            created_at: p.created_at,
        })
        .collect();
    Ok(Json(patients))
}

#[derive(Debug, Deserialize)]
pub struct WalkInAppointmentRequest {
    pub patient_name: String,
    pub patient_phone: String,
    pub doctor_id: i64,
    pub date_str: String,
    pub time_slot: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: AppointmentKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WalkInResponse {
    pub message: String,
    pub id: i64,
    pub patient_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom_link: Option<String>,
}

async fn book_walk_in(
    State(state): State<AppState>,
    AdminAuth(ctx): AdminAuth,
    Json(req): Json<WalkInAppointmentRequest>,
) -> ApiResult<Json<WalkInResponse>> {
    non_empty("patient_name", &req.patient_name)?;
    let patient = walk_in_patient(&state, &req.patient_name, &req.patient_phone).await?;
    let appt = book_consultation(
        &state,
        &patient,
        ConsultationRequest {
            doctor_id: req.doctor_id,
            date_str: &req.date_str,
            time_slot: &req.time_slot,
            kind: req.kind,
            symptoms_summary: None,
        },
        ctx.user_id,
    )
    .await?;
    Ok(Json(WalkInResponse {
        message: "Booking Successful".into(),
        id: appt.id,
        patient_id: patient.id,
        zoom_link: appt.zoom_link,
    }))
}

#[derive(Debug, Deserialize)]
pub struct WalkInLabRequest {
    pub patient_name: String,
    pub patient_phone: String,
    pub test_name: String,
}

/// Walk-in lab requests start `pending` at the current time; the lab
/// confirms them from the queue.
async fn book_walk_in_lab(
    State(state): State<AppState>,
    StaffAuth(ctx): StaffAuth,
    Json(req): Json<WalkInLabRequest>,
) -> ApiResult<Json<WalkInResponse>> {
    ctx.require_any(LAB_BOOKING_ROLES)?;
    non_empty("patient_name", &req.patient_name)?;
    non_empty("test_name", &req.test_name)?;
    let patient = walk_in_patient(&state, &req.patient_name, &req.patient_phone).await?;

    let now = clinic_now();
    let now = now.with_nanosecond(0).unwrap_or(now);
    let new_appt = NewAppointment::lab_test(patient.id, req.test_name.trim(), now)
        .with_status(AppointmentStatus::Pending);
    let appt = book_lab_test(&state, &patient, new_appt, ctx.user_id).await?;

    Ok(Json(WalkInResponse {
        message: "Lab Request Booked".into(),
        id: appt.id,
        patient_id: patient.id,
        zoom_link: None,
    }))
}

// ---- Audit ----

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

async fn audit_logs(
    State(state): State<AppState>,
    AdminAuth(_ctx): AdminAuth,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditLog>>> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT);
    Ok(Json(state.audit.recent(limit).await?))
}
