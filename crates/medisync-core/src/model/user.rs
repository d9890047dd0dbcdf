use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::non_blank;
use crate::validation::{ValidationErrors, Validator};

pub const MIN_PASSWORD_LEN: usize = 6;

string_enum! {
    /// Staff role; drives the authorization policy table.
    pub enum Role ("role") {
        Admin => "admin",
        Doctor => "doctor",
        Nurse => "nurse",
        Pharmacy => "pharmacy",
        Reception => "reception",
        Technician => "technician",
    }
}

string_enum! {
    pub enum UserStatus ("user status") {
        Active => "active",
        Inactive => "inactive",
    }
}

/// Stored user document. Carries the password hash, so it must never be
/// returned to clients directly; use [`PublicUser`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub department: Option<String>,
    pub status: UserStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn public(&self) -> PublicUser {
        PublicUser::from(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub status: UserStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            department: user.department.clone(),
            status: user.status,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
}

impl UserDraft {
    /// Plaintext password carried by the draft, if one was supplied.
    pub fn new_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// Build a user. `password_hash` is the hash of [`Self::new_password`] when
    /// one was supplied, otherwise the stored hash of an existing user.
    pub fn into_user(
        self,
        id: String,
        password_hash: Option<String>,
        created_at: OffsetDateTime,
    ) -> Result<User, ValidationErrors> {
        let mut v = Validator::new();
        let name = v.required_str("name", self.name, "Please add a name");
        let email = v
            .required_str("email", self.email, "Please add an email")
            .map(|e| e.to_lowercase());
        if let Some(email) = &email {
            v.check(is_plausible_email(email), "email", "Please add a valid email");
        }
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            v.check(
                password.chars().count() >= MIN_PASSWORD_LEN,
                "password",
                "Password must be at least 6 characters",
            );
        }
        let password_hash = v.required("password", password_hash, "Please add a password");
        let role = v.enumerated("role", self.role, Some(Role::Reception));
        let status = v.enumerated("status", self.status, Some(UserStatus::Active));

        match (name, email, password_hash, role, status) {
            (Some(name), Some(email), Some(password_hash), Some(role), Some(status))
                if v.is_ok() =>
            {
                Ok(User {
                    id,
                    name,
                    email,
                    password_hash,
                    role,
                    department: non_blank(self.department),
                    status,
                    created_at,
                })
            }
            _ => Err(v.into_errors()),
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}
