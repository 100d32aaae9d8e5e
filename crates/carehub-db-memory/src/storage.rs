use std::collections::BTreeMap;

use async_trait::async_trait;
use carehub_storage::{
    Appointment, AppointmentStorage, AppointmentUpdate, AuditLog, AuditStorage, NewAppointment,
    NewAuditLog, NewPrescription, NewUser, OrderStatus, Prescription, PrescriptionStorage,
    Storage, StorageError, User, UserRole, UserStorage,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    appointments: BTreeMap<i64, Appointment>,
    prescriptions: BTreeMap<i64, Prescription>,
    audit_logs: BTreeMap<i64, AuditLog>,
    last_id: i64,
}

impl Tables {
    /// Ids are shared across tables; they only need to be unique per table.
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn slot_taken(&self, doctor_id: i64, time: NaiveDateTime, except: Option<i64>) -> bool {
        self.appointments
            .values()
            .any(|a| Some(a.id) != except && a.occupies(doctor_id, time))
    }
}

/// In-memory storage backend.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: RwLock<Tables>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(mut items: Vec<T>, key: impl Fn(&T) -> (NaiveDateTime, i64)) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

#[async_trait]
impl UserStorage for InMemoryStorage {
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let mut tables = self.tables.write().await;

        if tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StorageError::already_exists("User", "email", user.email));
        }
        if let Some(uid) = &user.patient_uid
            && tables
                .users
                .values()
                .any(|u| u.patient_uid.as_deref() == Some(uid.as_str()))
        {
            return Err(StorageError::already_exists("User", "patient_uid", uid.clone()));
        }

        let id = tables.next_id();
        let stored = User {
            id,
            full_name: user.full_name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            phone: user.phone,
            patient_uid: user.patient_uid,
            department: user.department,
            is_gold_member: false,
            guardian_id: user.guardian_id,
            created_at: Utc::now(),
        };
        tables.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_patient_by_phone(&self, phone: &str) -> Result<Option<User>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.role == UserRole::Patient && u.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn list_users_by_role(
        &self,
        role: UserRole,
        department: Option<&str>,
    ) -> Result<Vec<User>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| u.role == role)
            .filter(|u| match department {
                Some(dept) => u
                    .department
                    .as_deref()
                    .is_some_and(|d| d.eq_ignore_ascii_case(dept)),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn list_dependents(&self, guardian_id: i64) -> Result<Vec<User>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| u.guardian_id == Some(guardian_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AppointmentStorage for InMemoryStorage {
    async fn create_appointment(&self, appt: NewAppointment) -> Result<Appointment, StorageError> {
        let mut tables = self.tables.write().await;

        if let Some(doctor_id) = appt.doctor_id
            && appt.status.is_active()
            && tables.slot_taken(doctor_id, appt.appointment_time, None)
        {
            return Err(StorageError::slot_taken(doctor_id, appt.appointment_time));
        }

        let id = tables.next_id();
        let stored = Appointment {
            id,
            patient_id: appt.patient_id,
            doctor_id: appt.doctor_id,
            appointment_time: appt.appointment_time,
            status: appt.status,
            kind: appt.kind,
            zoom_link: appt.zoom_link,
            symptoms_summary: appt.symptoms_summary,
            test_name: appt.test_name,
            lab_result: None,
            lab_report_url: None,
            created_at: Utc::now(),
        };
        tables.appointments.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, StorageError> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn list_appointments(&self) -> Result<Vec<Appointment>, StorageError> {
        let all = self.tables.read().await.appointments.values().cloned().collect();
        Ok(newest_first(all, |a| (a.appointment_time, a.id)))
    }

    async fn list_patient_appointments(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Appointment>, StorageError> {
        let mine = self
            .tables
            .read()
            .await
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        Ok(newest_first(mine, |a| (a.appointment_time, a.id)))
    }

    async fn booked_times(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .appointments
            .values()
            .filter(|a| {
                a.status.is_active()
                    && a.doctor_id == Some(doctor_id)
                    && a.appointment_time.date() == date
            })
            .map(|a| a.appointment_time.time())
            .collect())
    }

    async fn update_appointment(
        &self,
        id: i64,
        update: AppointmentUpdate,
    ) -> Result<Appointment, StorageError> {
        let mut tables = self.tables.write().await;
        let current = tables
            .appointments
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("Appointment", id))?;

        let mut next = current;
        if let Some(status) = update.status {
            next.status = status;
        }
        if let Some(time) = update.appointment_time {
            next.appointment_time = time;
        }
        if let Some(result) = update.lab_result {
            next.lab_result = Some(result);
        }

        if let Some(doctor_id) = next.doctor_id
            && next.status.is_active()
            && tables.slot_taken(doctor_id, next.appointment_time, Some(id))
        {
            return Err(StorageError::slot_taken(doctor_id, next.appointment_time));
        }

        tables.appointments.insert(id, next.clone());
        Ok(next)
    }
}

#[async_trait]
impl PrescriptionStorage for InMemoryStorage {
    async fn create_prescription(
        &self,
        prescription: NewPrescription,
    ) -> Result<Prescription, StorageError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let stored = Prescription {
            id,
            patient_id: prescription.patient_id,
            image_ref: prescription.image_ref,
            extracted_data: prescription.extracted_data,
            status: prescription.status,
            created_at: Utc::now(),
        };
        tables.prescriptions.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_prescription(&self, id: i64) -> Result<Option<Prescription>, StorageError> {
        Ok(self.tables.read().await.prescriptions.get(&id).cloned())
    }

    async fn list_prescriptions(&self) -> Result<Vec<Prescription>, StorageError> {
        let all = self.tables.read().await.prescriptions.values().cloned().collect();
        Ok(newest_first(all, |p| (p.created_at.naive_utc(), p.id)))
    }

    async fn list_patient_prescriptions(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Prescription>, StorageError> {
        let mine = self
            .tables
            .read()
            .await
            .prescriptions
            .values()
            .filter(|p| p.patient_id == patient_id)
            .cloned()
            .collect();
        Ok(newest_first(mine, |p| (p.created_at.naive_utc(), p.id)))
    }

    async fn update_prescription_status(
        &self,
        id: i64,
        status: OrderStatus,
    ) -> Result<Prescription, StorageError> {
        let mut tables = self.tables.write().await;
        let rx = tables
            .prescriptions
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("Prescription", id))?;

        if !rx.status.can_advance_to(status) {
            return Err(StorageError::invalid_transition(rx.status, status));
        }
        rx.status = status;
        Ok(rx.clone())
    }
}

#[async_trait]
impl AuditStorage for InMemoryStorage {
    async fn record_audit(&self, entry: NewAuditLog) -> Result<AuditLog, StorageError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let stored = AuditLog {
            id,
            action: entry.action,
            performed_by: entry.performed_by,
            timestamp: Utc::now(),
            details: entry.details,
        };
        tables.audit_logs.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_audit_logs(&self, limit: usize) -> Result<Vec<AuditLog>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.audit_logs.values().rev().take(limit).cloned().collect())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
