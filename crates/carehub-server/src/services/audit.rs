//! Best-effort audit trail persisted through storage.

use carehub_storage::{AuditLog, AuditStorage, DynStorage, NewAuditLog, StorageError};
use serde::{Deserialize, Serialize};

/// Audited actions, stored by their upper-case code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Register,
    Login,
    BookAppointment,
    BookLab,
    UploadPrescription,
    ViewPrescriptions,
    UpdateStatus,
    CreateDependent,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Register => "REGISTER",
            AuditAction::Login => "LOGIN",
            AuditAction::BookAppointment => "BOOK_APPOINTMENT",
            AuditAction::BookLab => "BOOK_LAB",
            AuditAction::UploadPrescription => "UPLOAD_PRESCRIPTION",
            AuditAction::ViewPrescriptions => "VIEW_PRESCRIPTIONS",
            AuditAction::UpdateStatus => "UPDATE_STATUS",
            AuditAction::CreateDependent => "CREATE_DEPENDENT",
        }
    }
}

#[derive(Clone)]
pub struct AuditTrail {
    storage: DynStorage,
}

impl AuditTrail {
    pub fn new(storage: DynStorage) -> Self {
        Self { storage }
    }

    /// Records an entry. Failures are logged and never reach the caller.
    pub async fn record(&self, action: AuditAction, performed_by: Option<i64>, details: impl Into<String>) {
        let entry = NewAuditLog {
            action: action.as_str().to_string(),
            performed_by,
            details: details.into(),
        };
        if let Err(e) = self.storage.record_audit(entry).await {
            tracing::warn!(action = action.as_str(), error = %e, "Failed to write audit log");
        }
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<AuditLog>, StorageError> {
        self.storage.list_audit_logs(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carehub_db_memory::InMemoryStorage;
    use std::sync::Arc;

    #[tokio::test]
    async fn records_and_lists_newest_first() {
        let trail = AuditTrail::new(Arc::new(InMemoryStorage::default()));
        trail.record(AuditAction::Register, Some(1), "first").await;
        trail.record(AuditAction::Login, Some(1), "second").await;

        let logs = trail.recent(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action, "LOGIN");
        assert_eq!(logs[1].details, "first");
    }

    #[test]
    fn action_codes_match_serde() {
        let json = serde_json::to_value(AuditAction::UploadPrescription).unwrap();
        assert_eq!(json, AuditAction::UploadPrescription.as_str());
    }
}
