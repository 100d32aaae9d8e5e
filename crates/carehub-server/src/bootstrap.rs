//! Startup account seeding.
//!
//! Creates the configured admin and staff accounts when their email is not
//! registered yet. Running it again is a no-op.

use carehub_auth::hash_password_async;
use carehub_storage::{DynStorage, NewUser, StorageError, UserRole, UserStorage};
use tracing::info;

use crate::config::BootstrapConfig;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapStats {
    pub created: usize,
    pub existing: usize,
}

pub async fn bootstrap_accounts(
    storage: &DynStorage,
    config: &BootstrapConfig,
) -> anyhow::Result<BootstrapStats> {
    let mut accounts: Vec<(NewUser, &str)> = Vec::new();

    if let Some(admin) = &config.admin_user {
        accounts.push((
            NewUser::new(&admin.full_name, &admin.email, String::new(), UserRole::Admin),
            admin.password.as_str(),
        ));
    }
    for staff in &config.staff {
        accounts.push((
            NewUser::new(&staff.full_name, &staff.email, String::new(), staff.role)
                .with_department(staff.department.clone()),
            staff.password.as_str(),
        ));
    }

    let mut stats = BootstrapStats::default();
    for (mut account, password) in accounts {
        if storage.find_user_by_email(&account.email).await?.is_some() {
            stats.existing += 1;
            continue;
        }
        account.password_hash = hash_password_async(password.to_string()).await?;
        let role = account.role;
        match storage.create_user(account).await {
            Ok(user) => {
                info!(user_id = user.id, email = %user.email, role = %role, "Bootstrap account created");
                stats.created += 1;
            }
            // Another instance created it concurrently.
            Err(StorageError::AlreadyExists { .. }) => stats.existing += 1,
            Err(e) => return Err(e.into()),
        }
    }

    if stats.created > 0 || stats.existing > 0 {
        info!(created = stats.created, existing = stats.existing, "Account bootstrap finished");
    }
    Ok(stats)
}
