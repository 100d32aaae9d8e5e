//! Queries over the `users` table.

use carehub_storage::{NewUser, StorageError, User, UserRole};
use sqlx_core::query::query;
use sqlx_postgres::{PgPool, PgRow};

use super::{column, enum_column};
use crate::error::{query_error, unique_violation};

const USER_COLUMNS: &str = "id, full_name, email, password_hash, role, phone, patient_uid, \
                            department, is_gold_member, guardian_id, created_at";

fn user_from_row(row: &PgRow) -> Result<User, StorageError> {
    Ok(User {
        id: column(row, "id")?,
        full_name: column(row, "full_name")?,
        email: column(row, "email")?,
        password_hash: column(row, "password_hash")?,
        role: enum_column(row, "role")?,
        phone: column(row, "phone")?,
        patient_uid: column(row, "patient_uid")?,
        department: column(row, "department")?,
        is_gold_member: column(row, "is_gold_member")?,
        guardian_id: column(row, "guardian_id")?,
        created_at: column(row, "created_at")?,
    })
}

pub async fn insert(pool: &PgPool, user: NewUser) -> Result<User, StorageError> {
    let sql = format!(
        "INSERT INTO users (full_name, email, password_hash, role, phone, patient_uid, department, guardian_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {USER_COLUMNS}"
    );

    let row = query(&sql)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.phone)
        .bind(&user.patient_uid)
        .bind(&user.department)
        .bind(user.guardian_id)
        .fetch_one(pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(c) if c.contains("patient_uid") => StorageError::already_exists(
                "User",
                "patient_uid",
                user.patient_uid.clone().unwrap_or_default(),
            ),
            Some(_) => StorageError::already_exists("User", "email", user.email.clone()),
            None => query_error("Failed to create user", e),
        })?;

    user_from_row(&row)
}

pub async fn by_id(pool: &PgPool, id: i64) -> Result<Option<User>, StorageError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| query_error("Failed to load user", e))?
        .as_ref()
        .map(user_from_row)
        .transpose()
}

pub async fn by_email(pool: &PgPool, email: &str) -> Result<Option<User>, StorageError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
    query(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(|e| query_error("Failed to load user by email", e))?
        .as_ref()
        .map(user_from_row)
        .transpose()
}

pub async fn patient_by_phone(pool: &PgPool, phone: &str) -> Result<Option<User>, StorageError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE role = 'patient' AND phone = $1 ORDER BY id LIMIT 1"
    );
    query(&sql)
        .bind(phone)
        .fetch_optional(pool)
        .await
        .map_err(|e| query_error("Failed to load patient by phone", e))?
        .as_ref()
        .map(user_from_row)
        .transpose()
}

pub async fn by_role(
    pool: &PgPool,
    role: UserRole,
    department: Option<&str>,
) -> Result<Vec<User>, StorageError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE role = $1 AND ($2::text IS NULL OR lower(department) = lower($2))
         ORDER BY id"
    );
    query(&sql)
        .bind(role.as_str())
        .bind(department)
        .fetch_all(pool)
        .await
        .map_err(|e| query_error("Failed to list users", e))?
        .iter()
        .map(user_from_row)
        .collect()
}

pub async fn dependents(pool: &PgPool, guardian_id: i64) -> Result<Vec<User>, StorageError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE guardian_id = $1 ORDER BY id");
    query(&sql)
        .bind(guardian_id)
        .fetch_all(pool)
        .await
        .map_err(|e| query_error("Failed to list dependents", e))?
        .iter()
        .map(user_from_row)
        .collect()
}
