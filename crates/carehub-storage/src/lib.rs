//! # carehub-storage
//!
//! Storage abstraction layer for the CareHub server.
//!
//! This crate defines the domain entities and the traits every backend
//! implements. It contains no implementation: see `carehub-db-memory` and
//! `carehub-db-postgres`.
//!
//! ## Invariants owned by storage
//!
//! - A user's email is unique (case-insensitive).
//! - A doctor has at most one active (non-cancelled) appointment per time.
//! - Prescription status never moves backwards.
//!
//! ## Example
//!
//! ```ignore
//! use carehub_storage::{DynStorage, StorageError};
//!
//! async fn doctor_name(storage: &DynStorage, id: i64) -> Result<String, StorageError> {
//!     storage
//!         .get_user(id)
//!         .await?
//!         .map(|u| u.full_name)
//!         .ok_or_else(|| StorageError::not_found("User", id))
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::{AppointmentStorage, AuditStorage, PrescriptionStorage, Storage, UserStorage};
pub use types::{
    Appointment, AppointmentKind, AppointmentStatus, AppointmentUpdate, AuditLog, NewAppointment,
    NewAuditLog, NewPrescription, NewUser, OrderStatus, ParseEnumError, Prescription, User,
    UserRole,
};

/// Type alias for a shared storage trait object.
pub type DynStorage = std::sync::Arc<dyn Storage>;
