//! Queries over the `prescriptions` table.

use carehub_storage::{NewPrescription, OrderStatus, Prescription, StorageError};
use sqlx_core::query::query;
use sqlx_postgres::{PgPool, PgRow};

use super::{column, enum_column};
use crate::error::query_error;

const PRESCRIPTION_COLUMNS: &str = "id, patient_id, image_ref, extracted_data, status, created_at";

fn prescription_from_row(row: &PgRow) -> Result<Prescription, StorageError> {
    Ok(Prescription {
        id: column(row, "id")?,
        patient_id: column(row, "patient_id")?,
        image_ref: column(row, "image_ref")?,
        extracted_data: column(row, "extracted_data")?,
        status: enum_column(row, "status")?,
        created_at: column(row, "created_at")?,
    })
}

pub async fn insert(pool: &PgPool, rx: NewPrescription) -> Result<Prescription, StorageError> {
    let sql = format!(
        "INSERT INTO prescriptions (patient_id, image_ref, extracted_data, status)
         VALUES ($1, $2, $3, $4)
         RETURNING {PRESCRIPTION_COLUMNS}"
    );
    let row = query(&sql)
        .bind(rx.patient_id)
        .bind(&rx.image_ref)
        .bind(&rx.extracted_data)
        .bind(rx.status.as_str())
        .fetch_one(pool)
        .await
        .map_err(|e| query_error("Failed to create prescription", e))?;

    prescription_from_row(&row)
}

pub async fn by_id(pool: &PgPool, id: i64) -> Result<Option<Prescription>, StorageError> {
    let sql = format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE id = $1");
    query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| query_error("Failed to load prescription", e))?
        .as_ref()
        .map(prescription_from_row)
        .transpose()
}

pub async fn all(pool: &PgPool) -> Result<Vec<Prescription>, StorageError> {
    let sql = format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions ORDER BY created_at DESC, id DESC");
    query(&sql)
        .fetch_all(pool)
        .await
        .map_err(|e| query_error("Failed to list prescriptions", e))?
        .iter()
        .map(prescription_from_row)
        .collect()
}

pub async fn for_patient(pool: &PgPool, patient_id: i64) -> Result<Vec<Prescription>, StorageError> {
    let sql = format!(
        "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions
         WHERE patient_id = $1
         ORDER BY created_at DESC, id DESC"
    );
    query(&sql)
        .bind(patient_id)
        .fetch_all(pool)
        .await
        .map_err(|e| query_error("Failed to list patient prescriptions", e))?
        .iter()
        .map(prescription_from_row)
        .collect()
}

/// Advances the status inside a transaction holding the row lock, so two
/// concurrent updates cannot interleave the check and the write.
pub async fn update_status(
    pool: &PgPool,
    id: i64,
    status: OrderStatus,
) -> Result<Prescription, StorageError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| query_error("Failed to begin transaction", e))?;

    let sql = format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE id = $1 FOR UPDATE");
    let current = query(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to lock prescription", e))?
        .as_ref()
        .map(prescription_from_row)
        .transpose()?
        .ok_or_else(|| StorageError::not_found("Prescription", id))?;

    if !current.status.can_advance_to(status) {
        return Err(StorageError::invalid_transition(current.status, status));
    }

    let sql = format!(
        "UPDATE prescriptions SET status = $2 WHERE id = $1 RETURNING {PRESCRIPTION_COLUMNS}"
    );
    let row = query(&sql)
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to update prescription", e))?;

    tx.commit()
        .await
        .map_err(|e| query_error("Failed to commit prescription update", e))?;

    prescription_from_row(&row)
}
