//! PostgreSQL implementation of the storage traits.

use async_trait::async_trait;
use carehub_storage::{
    Appointment, AppointmentStorage, AppointmentUpdate, AuditLog, AuditStorage, NewAppointment,
    NewAuditLog, NewPrescription, NewUser, OrderStatus, Prescription, PrescriptionStorage,
    Storage, StorageError, User, UserRole, UserStorage,
};
use chrono::{NaiveDate, NaiveTime};
use sqlx_postgres::PgPool;

use crate::config::PostgresConfig;
use crate::error::query_error;
use crate::queries::{appointments, audit, prescriptions, users};
use crate::{migrations, pool};

/// PostgreSQL storage backend.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a pool and, if configured, runs the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created
    /// or if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStorage for PostgresStorage {
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        users::insert(&self.pool, user).await
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError> {
        users::by_id(&self.pool, id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        users::by_email(&self.pool, email).await
    }

    async fn find_patient_by_phone(&self, phone: &str) -> Result<Option<User>, StorageError> {
        users::patient_by_phone(&self.pool, phone).await
    }

    async fn list_users_by_role(
        &self,
        role: UserRole,
        department: Option<&str>,
    ) -> Result<Vec<User>, StorageError> {
        users::by_role(&self.pool, role, department).await
    }

    async fn list_dependents(&self, guardian_id: i64) -> Result<Vec<User>, StorageError> {
        users::dependents(&self.pool, guardian_id).await
    }
}

#[async_trait]
impl AppointmentStorage for PostgresStorage {
    async fn create_appointment(&self, appt: NewAppointment) -> Result<Appointment, StorageError> {
        appointments::insert(&self.pool, appt).await
    }

    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, StorageError> {
        appointments::by_id(&self.pool, id).await
    }

    async fn list_appointments(&self) -> Result<Vec<Appointment>, StorageError> {
        appointments::all(&self.pool).await
    }

    async fn list_patient_appointments(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Appointment>, StorageError> {
        appointments::for_patient(&self.pool, patient_id).await
    }

    async fn booked_times(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, StorageError> {
        appointments::booked_times(&self.pool, doctor_id, date).await
    }

    async fn update_appointment(
        &self,
        id: i64,
        update: AppointmentUpdate,
    ) -> Result<Appointment, StorageError> {
        appointments::update(&self.pool, id, update).await
    }
}

#[async_trait]
impl PrescriptionStorage for PostgresStorage {
    async fn create_prescription(
        &self,
        prescription: NewPrescription,
    ) -> Result<Prescription, StorageError> {
        prescriptions::insert(&self.pool, prescription).await
    }

    async fn get_prescription(&self, id: i64) -> Result<Option<Prescription>, StorageError> {
        prescriptions::by_id(&self.pool, id).await
    }

    async fn list_prescriptions(&self) -> Result<Vec<Prescription>, StorageError> {
        prescriptions::all(&self.pool).await
    }

    async fn list_patient_prescriptions(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Prescription>, StorageError> {
        prescriptions::for_patient(&self.pool, patient_id).await
    }

    async fn update_prescription_status(
        &self,
        id: i64,
        status: OrderStatus,
    ) -> Result<Prescription, StorageError> {
        prescriptions::update_status(&self.pool, id, status).await
    }
}

#[async_trait]
impl AuditStorage for PostgresStorage {
    async fn record_audit(&self, entry: NewAuditLog) -> Result<AuditLog, StorageError> {
        audit::insert(&self.pool, entry).await
    }

    async fn list_audit_logs(&self, limit: usize) -> Result<Vec<AuditLog>, StorageError> {
        audit::recent(&self.pool, limit).await
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx_core::query::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Database ping failed", e))?;
        Ok(())
    }
}
