//! SQL query implementations, one module per table.

pub mod appointments;
pub mod audit;
pub mod prescriptions;
pub mod users;

use std::str::FromStr;

use carehub_storage::StorageError;
use sqlx_core::decode::Decode;
use sqlx_core::row::Row;
use sqlx_core::types::Type;
use sqlx_postgres::{PgRow, Postgres};

/// Reads a column, mapping decode failures to `StorageError::Internal`.
pub(crate) fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StorageError>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StorageError::internal(format!("Failed to decode column '{name}': {e}")))
}

/// Reads a TEXT column holding one of the wire enums.
pub(crate) fn enum_column<T>(row: &PgRow, name: &str) -> Result<T, StorageError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = column(row, name)?;
    raw.parse::<T>()
        .map_err(|e| StorageError::internal(format!("Invalid value in '{name}': {e}")))
}
