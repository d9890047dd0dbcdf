//! First-start data: the initial administrator and the default departments.
//!
//! Both steps are idempotent. Existing records (matched by email or department
//! code) are left untouched, so the bootstrap runs on every start.

use medisync_core::model::{DepartmentDraft, Role, UserDraft};
use medisync_storage::{Collection, Filter, Query};
use serde_json::json;
use tracing::{info, warn};

use crate::config::{AdminUserConfig, BootstrapConfig};
use crate::server::AppState;
use crate::services::ApiResult;

/// Default departments as `(name, code, description, floor, wing)`.
pub const DEFAULT_DEPARTMENTS: &[(&str, &str, &str, &str, &str)] = &[
    ("Cardiology", "CARD", "Heart and cardiovascular system", "3rd", "East"),
    ("Emergency", "EMER", "Emergency medical services", "1st", "Central"),
    ("Administration", "ADMN", "Hospital administration and management", "Ground", "West"),
    ("General Medicine", "GMED", "General medical services", "2nd", "West"),
    ("Pediatrics", "PEDS", "Medical care for children", "4th", "East"),
    ("Surgery", "SURG", "Surgical procedures and care", "3rd", "West"),
];

/// What the bootstrap created on this start.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BootstrapStats {
    pub admin_created: bool,
    pub departments_created: usize,
}

pub async fn run(state: &AppState, config: &BootstrapConfig) -> ApiResult<BootstrapStats> {
    let mut stats = BootstrapStats::default();
    if config.seed_departments {
        stats.departments_created = seed_departments(state).await?;
    }
    if let Some(admin) = &config.admin_user {
        stats.admin_created = ensure_admin(state, admin).await?;
    }
    info!(
        admin_created = stats.admin_created,
        departments_created = stats.departments_created,
        "bootstrap completed"
    );
    Ok(stats)
}

async fn seed_departments(state: &AppState) -> ApiResult<usize> {
    let mut created = 0;
    for (name, code, description, floor, wing) in DEFAULT_DEPARTMENTS {
        let exists = state
            .store
            .exists(
                Collection::Departments,
                &Query::new().filter(Filter::eq("code", *code)),
            )
            .await?;
        if exists {
            continue;
        }
        let draft: DepartmentDraft = serde_json::from_value(json!({
            "name": name,
            "code": code,
            "description": description,
            "location": {"floor": floor, "wing": wing}
        }))
        .map_err(|e| medisync_api::ApiError::internal(e.to_string()))?;
        state.departments.create(draft).await?;
        created += 1;
    }
    Ok(created)
}

async fn ensure_admin(state: &AppState, admin: &AdminUserConfig) -> ApiResult<bool> {
    if let Some(existing) = state.users.find_by_email(&admin.email).await? {
        if existing.role != Role::Admin {
            warn!(
                email = %existing.email,
                role = %existing.role,
                "bootstrap admin email belongs to a non-admin user"
            );
        }
        return Ok(false);
    }
    let user = state
        .users
        .create(UserDraft {
            name: Some(admin.name.clone()),
            email: Some(admin.email.clone()),
            password: Some(admin.password.clone()),
            role: Some(Role::Admin.to_string()),
            department: None,
            status: None,
        })
        .await?;
    info!(user_id = %user.id, email = %user.email, "bootstrap admin created");
    Ok(true)
}
