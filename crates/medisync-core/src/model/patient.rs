use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::non_blank;
use crate::validation::{ValidationErrors, Validator};

string_enum! {
    pub enum Gender ("gender") {
        Male => "male",
        Female => "female",
        Other => "other",
    }
}

string_enum! {
    /// Position of a patient in the department queue.
    pub enum PatientStatus ("patient status") {
        Waiting => "waiting",
        InConsultation => "in-consultation",
        Completed => "completed",
        NoShow => "no-show",
        Rescheduled => "rescheduled",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub contact_number: String,
    pub address: String,
    pub department: String,
    pub doctor: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub appointment_date: OffsetDateTime,
    pub status: PatientStatus,
    pub emergency: bool,
    /// Queue token, assigned once at registration.
    pub token_number: String,
    pub notes: Option<String>,
    pub medical_history: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDraft {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    pub department: Option<String>,
    pub doctor: Option<String>,
    pub appointment_date: Option<String>,
    pub status: Option<String>,
    pub emergency: Option<bool>,
    pub notes: Option<String>,
    pub medical_history: Option<String>,
}

impl PatientDraft {
    /// Department id named by the draft, trimmed.
    pub fn department_id(&self) -> Option<&str> {
        self.department
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency.unwrap_or(false)
    }

    /// Validate the draft without building, so callers can reject bad input
    /// before drawing a token sequence number.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        self.clone()
            .into_patient(String::new(), String::new(), OffsetDateTime::UNIX_EPOCH)
            .map(|_| ())
    }

    pub fn into_patient(
        self,
        id: String,
        token_number: String,
        created_at: OffsetDateTime,
    ) -> Result<Patient, ValidationErrors> {
        let mut v = Validator::new();
        let name = v.required_str("name", self.name, "Please add a name");
        let age = v.required("age", self.age, "Please add age");
        if let Some(age) = age {
            v.check((0..=150).contains(&age), "age", "Age must be between 0 and 150");
        }
        let gender = v.enumerated::<Gender>("gender", self.gender, None);
        let contact_number =
            v.required_str("contactNumber", self.contact_number, "Please add a contact number");
        let address = v.required_str("address", self.address, "Please add an address");
        let department = v.required_str("department", self.department, "Please add a department");
        let appointment_date = v.required_timestamp(
            "appointmentDate",
            self.appointment_date,
            "Please add an appointment date",
        );
        let status = v.enumerated("status", self.status, Some(PatientStatus::Waiting));

        match (name, age, gender, contact_number, address, department, appointment_date, status) {
            (
                Some(name),
                Some(age),
                Some(gender),
                Some(contact_number),
                Some(address),
                Some(department),
                Some(appointment_date),
                Some(status),
            ) if v.is_ok() => Ok(Patient {
                id,
                name,
                age: age as u32,
                gender,
                contact_number,
                address,
                department,
                doctor: non_blank(self.doctor),
                appointment_date,
                status,
                emergency: self.emergency.unwrap_or(false),
                token_number,
                notes: non_blank(self.notes),
                medical_history: non_blank(self.medical_history),
                created_at,
            }),
            _ => Err(v.into_errors()),
        }
    }
}
