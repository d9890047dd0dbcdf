use std::fmt;

/// Named document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Patients,
    Departments,
    Users,
    Operations,
    Medications,
    Prescriptions,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Patients,
        Collection::Departments,
        Collection::Users,
        Collection::Operations,
        Collection::Medications,
        Collection::Prescriptions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Patients => "patients",
            Collection::Departments => "departments",
            Collection::Users => "users",
            Collection::Operations => "operations",
            Collection::Medications => "medications",
            Collection::Prescriptions => "prescriptions",
        }
    }

    /// Top-level fields whose values must be unique within the collection.
    /// String values are compared case-insensitively.
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Departments => &["name", "code"],
            Collection::Medications => &["name"],
            Collection::Users => &["email"],
            Collection::Patients | Collection::Operations | Collection::Prescriptions => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
