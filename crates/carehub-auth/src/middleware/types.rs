//! Authentication context types.

use std::sync::Arc;

use carehub_storage::{User, UserRole};

use crate::error::AuthError;
use crate::token::jwt::AccessTokenClaims;

/// Authenticated request context, extracted by [`BearerAuth`](super::BearerAuth).
///
/// `claims` is wrapped in `Arc` so the context clones cheaply.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
    pub claims: Arc<AccessTokenClaims>,
}

impl AuthContext {
    #[must_use]
    pub fn from_claims(claims: AccessTokenClaims) -> Self {
        Self {
            user_id: claims.id,
            email: claims.sub.clone(),
            role: claims.role,
            claims: Arc::new(claims),
        }
    }

    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    #[must_use]
    pub fn has_any_role(&self, roles: &[UserRole]) -> bool {
        roles.contains(&self.role)
    }

    /// Fails with `Forbidden` unless the caller holds one of `roles`.
    pub fn require_any(&self, roles: &[UserRole]) -> Result<(), AuthError> {
        if self.has_any_role(roles) {
            return Ok(());
        }
        tracing::debug!(
            user_id = self.user_id,
            role = %self.role,
            required = ?roles,
            "Access denied: role not permitted"
        );
        Err(AuthError::forbidden("Not enough permissions"))
    }

    /// Staff may act on any patient; a patient only on themselves or
    /// on dependents whose guardian they are.
    #[must_use]
    pub fn can_access_patient(&self, patient: &User) -> bool {
        self.is_staff()
            || patient.id == self.user_id
            || patient.guardian_id == Some(self.user_id)
    }

    pub fn ensure_patient_access(&self, patient: &User) -> Result<(), AuthError> {
        if self.can_access_patient(patient) {
            Ok(())
        } else {
            Err(AuthError::forbidden("Not allowed to act for this patient"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i64, guardian_id: Option<i64>) -> User {
        User {
            id,
            full_name: "Someone".into(),
            email: format!("u{id}@example.com"),
            password_hash: String::new(),
            role: UserRole::Patient,
            phone: None,
            patient_uid: None,
            department: None,
            is_gold_member: false,
            guardian_id,
            created_at: Utc::now(),
        }
    }

    fn context(id: i64, role: UserRole) -> AuthContext {
        AuthContext::from_claims(AccessTokenClaims {
            iss: "carehub".into(),
            sub: format!("u{id}@example.com"),
            id,
            role,
            iat: 0,
            exp: i64::MAX,
            jti: "t".into(),
        })
    }

    #[test]
    fn test_patient_access_rules() {
        let me = context(1, UserRole::Patient);
        assert!(me.can_access_patient(&user(1, None)));
        assert!(me.can_access_patient(&user(5, Some(1))));
        assert!(!me.can_access_patient(&user(2, None)));
        assert!(!me.can_access_patient(&user(6, Some(2))));

        let doctor = context(9, UserRole::Doctor);
        assert!(doctor.can_access_patient(&user(2, None)));
    }

    #[test]
    fn test_require_any() {
        let lab = context(3, UserRole::Lab);
        assert!(lab.require_any(&[UserRole::Admin, UserRole::Lab]).is_ok());
        assert!(matches!(
            lab.require_any(&[UserRole::Pharmacist]),
            Err(AuthError::Forbidden { .. })
        ));
    }
}
