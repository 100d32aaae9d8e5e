//! Queries over the `appointments` table.
//!
//! Slot collisions are rejected by the partial unique index
//! `appointments_doctor_slot_active_idx`, so the check and the write are
//! one statement.

use carehub_storage::{Appointment, AppointmentUpdate, NewAppointment, StorageError};
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx_core::query::query;
use sqlx_postgres::{PgPool, PgRow};

use super::{column, enum_column};
use crate::error::{DOCTOR_SLOT_INDEX, query_error, unique_violation};

const APPOINTMENT_COLUMNS: &str = "id, patient_id, doctor_id, appointment_time, status, type, \
                                   zoom_link, symptoms_summary, test_name, lab_result, \
                                   lab_report_url, created_at";

fn appointment_from_row(row: &PgRow) -> Result<Appointment, StorageError> {
    Ok(Appointment {
        id: column(row, "id")?,
        patient_id: column(row, "patient_id")?,
        doctor_id: column(row, "doctor_id")?,
        appointment_time: column(row, "appointment_time")?,
        status: enum_column(row, "status")?,
        kind: enum_column(row, "type")?,
        zoom_link: column(row, "zoom_link")?,
        symptoms_summary: column(row, "symptoms_summary")?,
        test_name: column(row, "test_name")?,
        lab_result: column(row, "lab_result")?,
        lab_report_url: column(row, "lab_report_url")?,
        created_at: column(row, "created_at")?,
    })
}

fn write_error(
    context: &str,
    doctor_id: Option<i64>,
    time: NaiveDateTime,
    err: sqlx_core::error::Error,
) -> StorageError {
    match (unique_violation(&err), doctor_id) {
        (Some(DOCTOR_SLOT_INDEX), Some(doctor_id)) => StorageError::slot_taken(doctor_id, time),
        _ => query_error(context, err),
    }
}

pub async fn insert(pool: &PgPool, appt: NewAppointment) -> Result<Appointment, StorageError> {
    let sql = format!(
        "INSERT INTO appointments
             (patient_id, doctor_id, appointment_time, status, type, zoom_link, symptoms_summary, test_name)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {APPOINTMENT_COLUMNS}"
    );

    let row = query(&sql)
        .bind(appt.patient_id)
        .bind(appt.doctor_id)
        .bind(appt.appointment_time)
        .bind(appt.status.as_str())
        .bind(appt.kind.as_str())
        .bind(&appt.zoom_link)
        .bind(&appt.symptoms_summary)
        .bind(&appt.test_name)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            write_error(
                "Failed to create appointment",
                appt.doctor_id,
                appt.appointment_time,
                e,
            )
        })?;

    appointment_from_row(&row)
}

pub async fn by_id(pool: &PgPool, id: i64) -> Result<Option<Appointment>, StorageError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1");
    query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| query_error("Failed to load appointment", e))?
        .as_ref()
        .map(appointment_from_row)
        .transpose()
}

pub async fn all(pool: &PgPool) -> Result<Vec<Appointment>, StorageError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY appointment_time DESC, id DESC"
    );
    query(&sql)
        .fetch_all(pool)
        .await
        .map_err(|e| query_error("Failed to list appointments", e))?
        .iter()
        .map(appointment_from_row)
        .collect()
}

pub async fn for_patient(pool: &PgPool, patient_id: i64) -> Result<Vec<Appointment>, StorageError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE patient_id = $1
         ORDER BY appointment_time DESC, id DESC"
    );
    query(&sql)
        .bind(patient_id)
        .fetch_all(pool)
        .await
        .map_err(|e| query_error("Failed to list patient appointments", e))?
        .iter()
        .map(appointment_from_row)
        .collect()
}

pub async fn booked_times(
    pool: &PgPool,
    doctor_id: i64,
    date: NaiveDate,
) -> Result<Vec<NaiveTime>, StorageError> {
    let start = date.and_time(NaiveTime::MIN);
    let end = date
        .checked_add_days(Days::new(1))
        .map(|d| d.and_time(NaiveTime::MIN))
        .unwrap_or(NaiveDateTime::MAX);

    let rows = query(
        "SELECT appointment_time FROM appointments
         WHERE doctor_id = $1 AND status <> 'cancelled'
           AND appointment_time >= $2 AND appointment_time < $3
         ORDER BY appointment_time",
    )
    .bind(doctor_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
    .map_err(|e| query_error("Failed to load booked slots", e))?;

    rows.iter()
        .map(|row| column::<NaiveDateTime>(row, "appointment_time").map(|t| t.time()))
        .collect()
}

pub async fn update(
    pool: &PgPool,
    id: i64,
    update: AppointmentUpdate,
) -> Result<Appointment, StorageError> {
    let current = by_id(pool, id)
        .await?
        .ok_or_else(|| StorageError::not_found("Appointment", id))?;
    let target_time = update.appointment_time.unwrap_or(current.appointment_time);

    let sql = format!(
        "UPDATE appointments
         SET status = COALESCE($2, status),
             appointment_time = COALESCE($3, appointment_time),
             lab_result = COALESCE($4, lab_result)
         WHERE id = $1
         RETURNING {APPOINTMENT_COLUMNS}"
    );

    let row = query(&sql)
        .bind(id)
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.appointment_time)
        .bind(&update.lab_result)
        .fetch_optional(pool)
        .await
        .map_err(|e| write_error("Failed to update appointment", current.doctor_id, target_time, e))?
        .ok_or_else(|| StorageError::not_found("Appointment", id))?;

    appointment_from_row(&row)
}
