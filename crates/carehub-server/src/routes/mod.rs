//! HTTP routers, one per URL prefix.
//!
//! Handlers share the helpers below for patient lookup, consultation
//! booking and walk-in registration so that both the patient portal and the
//! front desk go through the same checks.

pub mod admin;
pub mod auth;
pub mod patient;
pub mod pharmacy;

use carehub_api::{ApiError, ApiResult};
use carehub_auth::{AuthContext, UNUSABLE_PASSWORD};
use carehub_core::{BUSINESS_SLOTS, generate_patient_uid, slot_datetime};
use carehub_storage::{
    Appointment, AppointmentKind, AppointmentStorage, NewAppointment, NewUser, StorageError, User,
    UserRole, UserStorage,
};
use chrono::{Datelike, Local, NaiveDateTime};

use crate::server::AppState;
use crate::services::AuditAction;

/// Attempts made when a freshly generated patient uid collides.
const PATIENT_UID_ATTEMPTS: usize = 5;

/// Wall-clock time of the clinic.
pub(crate) fn clinic_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Loads a patient account the caller may act for.
pub(crate) async fn load_patient(
    state: &AppState,
    ctx: &AuthContext,
    patient_id: i64,
) -> ApiResult<User> {
    let user = state
        .storage
        .get_user(patient_id)
        .await?
        .filter(|u| u.role == UserRole::Patient)
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;
    ctx.ensure_patient_access(&user)?;
    Ok(user)
}

/// Creates a patient, regenerating the `PAT-` identifier on collision.
pub(crate) async fn create_patient(state: &AppState, user: NewUser) -> ApiResult<User> {
    let year = Local::now().year();
    for _ in 0..PATIENT_UID_ATTEMPTS {
        let candidate = user.clone().with_patient_uid(generate_patient_uid(year));
        match state.storage.create_user(candidate).await {
            Err(StorageError::AlreadyExists { field, .. }) if field == "patient_uid" => continue,
            other => return Ok(other?),
        }
    }
    Err(ApiError::internal("Could not allocate a patient identifier"))
}

/// Finds a walk-in patient by phone or registers one with a placeholder
/// email and no usable password.
pub(crate) async fn walk_in_patient(
    state: &AppState,
    full_name: &str,
    phone: &str,
) -> ApiResult<User> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(ApiError::bad_request("patient_phone must not be empty"));
    }
    if let Some(patient) = state.storage.find_patient_by_phone(phone).await? {
        return Ok(patient);
    }
    let new_user = NewUser::new(
        full_name.trim(),
        format!("{phone}@temp.com"),
        UNUSABLE_PASSWORD,
        UserRole::Patient,
    )
    .with_phone(Some(phone.to_string()));
    let patient = create_patient(state, new_user).await?;
    tracing::info!(patient_id = patient.id, "Walk-in patient registered");
    Ok(patient)
}

/// Resolves a business slot on `date_str` that has not started yet.
pub(crate) fn bookable_slot(date_str: &str, time_slot: &str) -> ApiResult<NaiveDateTime> {
    if !BUSINESS_SLOTS.contains(&time_slot.trim()) {
        return Err(ApiError::bad_request(format!(
            "'{time_slot}' is not a bookable slot"
        )));
    }
    let when = slot_datetime(date_str, time_slot)?;
    if when < clinic_now() {
        return Err(ApiError::bad_request("Cannot book a slot in the past"));
    }
    Ok(when)
}

pub(crate) struct ConsultationRequest<'a> {
    pub doctor_id: i64,
    pub date_str: &'a str,
    pub time_slot: &'a str,
    pub kind: AppointmentKind,
    pub symptoms_summary: Option<String>,
}

/// Books a consultation, creating a meeting for online visits, and
/// announces it on the realtime channel.
pub(crate) async fn book_consultation(
    state: &AppState,
    patient: &User,
    req: ConsultationRequest<'_>,
    performed_by: i64,
) -> ApiResult<Appointment> {
    if req.kind == AppointmentKind::LabTest {
        return Err(ApiError::bad_request("Lab tests are booked through book_lab"));
    }
    let when = bookable_slot(req.date_str, req.time_slot)?;

    let doctor = state
        .storage
        .get_user(req.doctor_id)
        .await?
        .filter(|u| u.role == UserRole::Doctor)
        .ok_or_else(|| ApiError::not_found("Doctor not found"))?;

    // Fail fast before creating a meeting; the insert below re-checks atomically.
    let booked = state.storage.booked_times(doctor.id, when.date()).await?;
    if booked.contains(&when.time()) {
        return Err(StorageError::slot_taken(doctor.id, when).into());
    }

    let zoom_link = match req.kind {
        AppointmentKind::Online => Some(
            state
                .video
                .meeting_link(&format!("Consultation with {}", doctor.full_name), when)
                .await,
        ),
        _ => None,
    };

    let mut new_appt = NewAppointment::consultation(patient.id, doctor.id, when, req.kind)
        .with_zoom_link(zoom_link);
    new_appt.symptoms_summary = req.symptoms_summary;
    let appt = state.storage.create_appointment(new_appt).await?;

    state.broadcaster.publish_new_appointment(
        appt.id,
        appt.doctor_id,
        appt.appointment_time.time(),
        appt.patient_id,
    );
    state
        .audit
        .record(
            AuditAction::BookAppointment,
            Some(performed_by),
            format!(
                "Appointment #{} with doctor #{} at {} for patient #{}",
                appt.id, doctor.id, appt.appointment_time, patient.id
            ),
        )
        .await;
    Ok(appt)
}

/// Books a lab test and announces it on the realtime channel.
pub(crate) async fn book_lab_test(
    state: &AppState,
    patient: &User,
    new_appt: NewAppointment,
    performed_by: i64,
) -> ApiResult<Appointment> {
    let appt = state.storage.create_appointment(new_appt).await?;
    state.broadcaster.publish_new_appointment(
        appt.id,
        None,
        appt.appointment_time.time(),
        appt.patient_id,
    );
    state
        .audit
        .record(
            AuditAction::BookLab,
            Some(performed_by),
            format!(
                "Lab test '{}' #{} for patient #{}",
                appt.test_name.as_deref().unwrap_or_default(),
                appt.id,
                patient.id
            ),
        )
        .await;
    Ok(appt)
}

pub(crate) fn format_time(time: NaiveDateTime) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

pub(crate) fn non_empty(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{field} must not be empty")));
    }
    Ok(())
}
