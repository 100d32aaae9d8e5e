//! Storage traits that every backend implements.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use crate::error::StorageError;
use crate::types::{
    Appointment, AppointmentUpdate, AuditLog, NewAppointment, NewAuditLog, NewPrescription,
    NewUser, OrderStatus, Prescription, User, UserRole,
};

#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Inserts a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the email or patient uid is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError>;

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError>;

    /// Case-insensitive lookup by email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    /// First patient registered with this phone number.
    async fn find_patient_by_phone(&self, phone: &str) -> Result<Option<User>, StorageError>;

    /// Users with the given role, optionally restricted to a department, ordered by id.
    async fn list_users_by_role(
        &self,
        role: UserRole,
        department: Option<&str>,
    ) -> Result<Vec<User>, StorageError>;

    /// Accounts whose guardian is `guardian_id`, ordered by id.
    async fn list_dependents(&self, guardian_id: i64) -> Result<Vec<User>, StorageError>;
}

#[async_trait]
pub trait AppointmentStorage: Send + Sync {
    /// Inserts an appointment.
    ///
    /// The slot check and the insert are atomic: two concurrent bookings of
    /// the same doctor and time cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::SlotTaken` if the doctor already has an active
    /// appointment at that time.
    async fn create_appointment(&self, appt: NewAppointment) -> Result<Appointment, StorageError>;

    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, StorageError>;

    /// All appointments, newest appointment time first.
    async fn list_appointments(&self) -> Result<Vec<Appointment>, StorageError>;

    /// A patient's appointments, newest appointment time first.
    async fn list_patient_appointments(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Appointment>, StorageError>;

    /// Times of the doctor's active appointments on `date`.
    async fn booked_times(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, StorageError>;

    /// Applies a staff update.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown id and
    /// `StorageError::SlotTaken` when a reschedule or reactivation collides.
    async fn update_appointment(
        &self,
        id: i64,
        update: AppointmentUpdate,
    ) -> Result<Appointment, StorageError>;
}

#[async_trait]
pub trait PrescriptionStorage: Send + Sync {
    async fn create_prescription(
        &self,
        prescription: NewPrescription,
    ) -> Result<Prescription, StorageError>;

    async fn get_prescription(&self, id: i64) -> Result<Option<Prescription>, StorageError>;

    /// All prescriptions, newest first.
    async fn list_prescriptions(&self) -> Result<Vec<Prescription>, StorageError>;

    /// A patient's prescriptions, newest first.
    async fn list_patient_prescriptions(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Prescription>, StorageError>;

    /// Moves a prescription forward.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidTransition` when `status` is behind the current one.
    async fn update_prescription_status(
        &self,
        id: i64,
        status: OrderStatus,
    ) -> Result<Prescription, StorageError>;
}

#[async_trait]
pub trait AuditStorage: Send + Sync {
    async fn record_audit(&self, entry: NewAuditLog) -> Result<AuditLog, StorageError>;

    /// Most recent entries first.
    async fn list_audit_logs(&self, limit: usize) -> Result<Vec<AuditLog>, StorageError>;
}

/// Umbrella trait over all repositories of one backend.
#[async_trait]
pub trait Storage: UserStorage + AppointmentStorage + PrescriptionStorage + AuditStorage {
    /// Short backend name for logs and readiness output.
    fn backend_name(&self) -> &'static str;

    /// Checks that the backend can serve requests.
    async fn ping(&self) -> Result<(), StorageError>;
}
