//! Role policy table.
//!
//! Every protected operation is a `(Resource, Action)` pair. The table below
//! lists which roles may perform each pair; pairs without an entry are denied
//! to everyone.

use medisync_core::model::Role;

use crate::error::AuthError;

/// Protected resource families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Patients,
    Operations,
    Pharmacy,
    Departments,
    Users,
    Profile,
    Prescriptions,
    Realtime,
}

/// Operations on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    UpdateStatus,
    Prescribe,
    Stock,
    Dispense,
}

#[derive(Debug, Clone, Copy)]
enum Allowed {
    Any,
    Roles(&'static [Role]),
}

const ADMIN: &[Role] = &[Role::Admin];
const PHARMACY_STAFF: &[Role] = &[Role::Admin, Role::Pharmacy];

const POLICY: &[(Resource, Action, Allowed)] = &[
    (Resource::Patients, Action::Read, Allowed::Any),
    (Resource::Patients, Action::Create, Allowed::Any),
    (Resource::Patients, Action::Update, Allowed::Any),
    (Resource::Patients, Action::Delete, Allowed::Any),
    (Resource::Patients, Action::UpdateStatus, Allowed::Any),
    (Resource::Patients, Action::Prescribe, Allowed::Any),
    (Resource::Operations, Action::Read, Allowed::Any),
    (Resource::Operations, Action::Create, Allowed::Any),
    (Resource::Operations, Action::Update, Allowed::Any),
    (Resource::Operations, Action::Delete, Allowed::Any),
    (Resource::Operations, Action::UpdateStatus, Allowed::Any),
    (Resource::Pharmacy, Action::Read, Allowed::Any),
    (Resource::Pharmacy, Action::Create, Allowed::Roles(PHARMACY_STAFF)),
    (Resource::Pharmacy, Action::Update, Allowed::Roles(PHARMACY_STAFF)),
    (Resource::Pharmacy, Action::Delete, Allowed::Roles(PHARMACY_STAFF)),
    (Resource::Pharmacy, Action::Stock, Allowed::Roles(PHARMACY_STAFF)),
    (Resource::Departments, Action::Read, Allowed::Any),
    (Resource::Departments, Action::Create, Allowed::Roles(ADMIN)),
    (Resource::Departments, Action::Update, Allowed::Roles(ADMIN)),
    (Resource::Departments, Action::Delete, Allowed::Roles(ADMIN)),
    (Resource::Users, Action::Read, Allowed::Roles(ADMIN)),
    (Resource::Users, Action::Create, Allowed::Roles(ADMIN)),
    (Resource::Users, Action::Update, Allowed::Roles(ADMIN)),
    (Resource::Users, Action::Delete, Allowed::Roles(ADMIN)),
    (Resource::Profile, Action::Read, Allowed::Any),
    (Resource::Profile, Action::Update, Allowed::Any),
    (Resource::Prescriptions, Action::Read, Allowed::Any),
    (Resource::Prescriptions, Action::Dispense, Allowed::Roles(PHARMACY_STAFF)),
    (Resource::Realtime, Action::Read, Allowed::Any),
];

fn lookup(resource: Resource, action: Action) -> Option<Allowed> {
    POLICY
        .iter()
        .find(|(r, a, _)| *r == resource && *a == action)
        .map(|(_, _, allowed)| *allowed)
}

/// Returns `true` if `role` may perform `action` on `resource`.
pub fn is_allowed(role: Role, resource: Resource, action: Action) -> bool {
    match lookup(resource, action) {
        Some(Allowed::Any) => true,
        Some(Allowed::Roles(roles)) => roles.contains(&role),
        None => false,
    }
}

/// Checks the policy table.
///
/// # Errors
///
/// Returns [`AuthError::Forbidden`] naming the role when the pair is denied.
pub fn authorize(role: Role, resource: Resource, action: Action) -> Result<(), AuthError> {
    if is_allowed(role, resource, action) {
        Ok(())
    } else {
        tracing::debug!(%role, ?resource, ?action, "access denied by policy");
        Err(AuthError::forbidden(role.as_str()))
    }
}
