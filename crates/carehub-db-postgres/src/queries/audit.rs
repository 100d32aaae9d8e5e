//! Queries over the `audit_logs` table.

use carehub_storage::{AuditLog, NewAuditLog, StorageError};
use sqlx_core::query::query;
use sqlx_postgres::{PgPool, PgRow};

use super::column;
use crate::error::query_error;

fn audit_from_row(row: &PgRow) -> Result<AuditLog, StorageError> {
    Ok(AuditLog {
        id: column(row, "id")?,
        action: column(row, "action")?,
        performed_by: column(row, "performed_by")?,
        timestamp: column(row, "timestamp")?,
        details: column(row, "details")?,
    })
}

pub async fn insert(pool: &PgPool, entry: NewAuditLog) -> Result<AuditLog, StorageError> {
    let row = query(
        "INSERT INTO audit_logs (action, performed_by, details)
         VALUES ($1, $2, $3)
         RETURNING id, action, performed_by, timestamp, details",
    )
    .bind(&entry.action)
    .bind(entry.performed_by)
    .bind(&entry.details)
    .fetch_one(pool)
    .await
    .map_err(|e| query_error("Failed to record audit log", e))?;

    audit_from_row(&row)
}

pub async fn recent(pool: &PgPool, limit: usize) -> Result<Vec<AuditLog>, StorageError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    query(
        "SELECT id, action, performed_by, timestamp, details
         FROM audit_logs ORDER BY id DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| query_error("Failed to list audit logs", e))?
    .iter()
    .map(audit_from_row)
    .collect()
}
