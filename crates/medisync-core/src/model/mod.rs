//! Hospital domain entities.
//!
//! Each entity has a stored form (the struct persisted as a JSON document) and
//! a draft form deserialized from request bodies. Drafts are all-optional so
//! that missing fields surface as validation errors rather than decode errors;
//! `into_*` converts a draft into the entity or returns every field error.

/// Declares a string-valued enum with kebab-case wire names, `as_str`,
/// `Display` and a `FromStr` that reports unknown values.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($label:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s {
                    $($text => ::std::result::Result::Ok($name::$variant),)+
                    other => ::std::result::Result::Err(::std::format!(
                        "'{}' is not a valid {}",
                        other, $label
                    )),
                }
            }
        }
    };
}

pub mod department;
pub mod medication;
pub mod operation;
pub mod patient;
pub mod prescription;
pub mod user;

pub use department::{Department, DepartmentDraft, Location, OperatingHours};
pub use medication::{DosageForm, Medication, MedicationDraft, MedicationView, StockAction};
pub use operation::{Operation, OperationDraft, OperationStatus, Priority};
pub use patient::{Gender, Patient, PatientDraft, PatientStatus};
pub use prescription::{Prescription, PrescriptionDraft, PrescriptionStatus};
pub use user::{PublicUser, Role, User, UserDraft, UserStatus};

/// Trim an optional free-text field; blank input becomes `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
