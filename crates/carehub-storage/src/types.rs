//! Domain entities persisted by storage backends.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error returned when parsing an enum from its wire name fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` over the snake_case wire names.
macro_rules! wire_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

// ==================== Users ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Patient,
    Doctor,
    Admin,
    Lab,
    Pharmacist,
}

wire_enum!(UserRole, "role", {
    Patient => "patient",
    Doctor => "doctor",
    Admin => "admin",
    Lab => "lab",
    Pharmacist => "pharmacist",
});

impl UserRole {
    /// Every role except `patient`.
    pub fn is_staff(&self) -> bool {
        !matches!(self, Self::Patient)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    pub phone: Option<String>,
    /// Human-facing `PAT-<year>-<XXXX>` identifier; patients only.
    pub patient_uid: Option<String>,
    /// Clinical department; doctors only.
    pub department: Option<String>,
    pub is_gold_member: bool,
    /// Account that manages this one (family dependents).
    pub guardian_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub patient_uid: Option<String>,
    pub department: Option<String>,
    pub guardian_id: Option<i64>,
}

impl NewUser {
    pub fn new(
        full_name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: UserRole,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role,
            phone: None,
            patient_uid: None,
            department: None,
            guardian_id: None,
        }
    }

    pub fn with_phone(mut self, phone: Option<String>) -> Self {
        self.phone = phone;
        self
    }

    pub fn with_patient_uid(mut self, uid: impl Into<String>) -> Self {
        self.patient_uid = Some(uid.into());
        self
    }

    pub fn with_department(mut self, department: Option<String>) -> Self {
        self.department = department;
        self
    }

    pub fn with_guardian(mut self, guardian_id: i64) -> Self {
        self.guardian_id = Some(guardian_id);
        self
    }
}

// ==================== Appointments ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    Clinic,
    Online,
    LabTest,
}

wire_enum!(AppointmentKind, "appointment type", {
    Clinic => "clinic",
    Online => "online",
    LabTest => "lab_test",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
}

wire_enum!(AppointmentStatus, "appointment status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
    Rescheduled => "rescheduled",
});

impl AppointmentStatus {
    /// Active appointments occupy their doctor's slot.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: i64,
    /// `None` for lab tests.
    pub doctor_id: Option<i64>,
    pub appointment_time: NaiveDateTime,
    pub status: AppointmentStatus,
    #[serde(rename = "type")]
    pub kind: AppointmentKind,
    pub zoom_link: Option<String>,
    pub symptoms_summary: Option<String>,
    pub test_name: Option<String>,
    pub lab_result: Option<String>,
    pub lab_report_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Whether this appointment blocks `doctor_id` at `time`.
    pub fn occupies(&self, doctor_id: i64, time: NaiveDateTime) -> bool {
        self.status.is_active() && self.doctor_id == Some(doctor_id) && self.appointment_time == time
    }
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub doctor_id: Option<i64>,
    pub appointment_time: NaiveDateTime,
    pub status: AppointmentStatus,
    pub kind: AppointmentKind,
    pub zoom_link: Option<String>,
    pub symptoms_summary: Option<String>,
    pub test_name: Option<String>,
}

impl NewAppointment {
    /// A pending consultation with a doctor.
    pub fn consultation(
        patient_id: i64,
        doctor_id: i64,
        appointment_time: NaiveDateTime,
        kind: AppointmentKind,
    ) -> Self {
        Self {
            patient_id,
            doctor_id: Some(doctor_id),
            appointment_time,
            status: AppointmentStatus::Pending,
            kind,
            zoom_link: None,
            symptoms_summary: None,
            test_name: None,
        }
    }

    /// A confirmed lab test, not tied to a doctor.
    pub fn lab_test(patient_id: i64, test_name: impl Into<String>, appointment_time: NaiveDateTime) -> Self {
        Self {
            patient_id,
            doctor_id: None,
            appointment_time,
            status: AppointmentStatus::Confirmed,
            kind: AppointmentKind::LabTest,
            zoom_link: None,
            symptoms_summary: None,
            test_name: Some(test_name.into()),
        }
    }

    pub fn with_zoom_link(mut self, link: Option<String>) -> Self {
        self.zoom_link = link;
        self
    }

    pub fn with_status(mut self, status: AppointmentStatus) -> Self {
        self.status = status;
        self
    }
}

/// Partial update applied by staff. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct AppointmentUpdate {
    pub status: Option<AppointmentStatus>,
    pub appointment_time: Option<NaiveDateTime>,
    pub lab_result: Option<String>,
}

impl AppointmentUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.appointment_time.is_none() && self.lab_result.is_none()
    }
}

// ==================== Prescriptions ====================

/// Fulfilment status shared by prescriptions and pharmacy orders.
///
/// Statuses only move forward: processing, preparing, ready, delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Processing,
    Preparing,
    Ready,
    Delivered,
}

wire_enum!(OrderStatus, "order status", {
    Processing => "processing",
    Preparing => "preparing",
    Ready => "ready",
    Delivered => "delivered",
});

impl OrderStatus {
    /// Re-applying the current status is allowed; going back is not.
    pub fn can_advance_to(&self, next: OrderStatus) -> bool {
        next >= *self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: i64,
    pub patient_id: i64,
    /// Original upload file name.
    pub image_ref: Option<String>,
    /// Sealed extracted text; never plaintext.
    pub extracted_data: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub patient_id: i64,
    pub image_ref: Option<String>,
    pub extracted_data: String,
    pub status: OrderStatus,
}

// ==================== Audit ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: i64,
    pub action: String,
    pub performed_by: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub action: String,
    pub performed_by: Option<i64>,
    pub details: String,
}
