use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::non_blank;
use crate::error::{CoreError, Result};
use crate::validation::{ValidationErrors, Validator};

string_enum! {
    pub enum PrescriptionStatus ("prescription status") {
        Pending => "pending",
        Dispensed => "dispensed",
        Cancelled => "cancelled",
    }
}

/// A prescription written for a patient. Owned by the patient: deleting the
/// patient deletes its prescriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: String,
    pub patient: String,
    pub prescribed_by: Option<String>,
    /// Medication name as written by the prescriber.
    pub medication: String,
    pub medication_id: Option<String>,
    pub quantity: Option<u32>,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub prescribed: OffsetDateTime,
    pub status: PrescriptionStatus,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub dispensed_at: Option<OffsetDateTime>,
    pub dispensed_by: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Prescription {
    /// Stock to draw when dispensing: only when both a catalogue link and a
    /// quantity were recorded.
    pub fn stock_draw(&self) -> Option<(&str, u32)> {
        match (self.medication_id.as_deref(), self.quantity) {
            (Some(id), Some(qty)) => Some((id, qty)),
            _ => None,
        }
    }

    pub fn dispense(&mut self, by: &str, now: OffsetDateTime) -> Result<()> {
        if self.status != PrescriptionStatus::Pending {
            return Err(CoreError::invalid_transition(
                self.status.as_str(),
                PrescriptionStatus::Dispensed.as_str(),
            ));
        }
        self.status = PrescriptionStatus::Dispensed;
        self.dispensed_at = Some(now);
        self.dispensed_by = Some(by.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionDraft {
    pub medication: Option<String>,
    pub medication_id: Option<String>,
    pub quantity: Option<i64>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub notes: Option<String>,
    pub prescribed: Option<String>,
}

impl PrescriptionDraft {
    pub fn into_prescription(
        self,
        id: String,
        patient: String,
        prescribed_by: Option<String>,
        now: OffsetDateTime,
    ) -> std::result::Result<Prescription, ValidationErrors> {
        let mut v = Validator::new();
        let medication = v.required_str("medication", self.medication, "Please add a medication");
        let dosage = v.required_str("dosage", self.dosage, "Please add a dosage");
        let frequency = v.required_str("frequency", self.frequency, "Please add a frequency");
        let duration = v.required_str("duration", self.duration, "Please add a duration");
        let quantity = match self.quantity {
            None => Some(None),
            Some(q) => match u32::try_from(q) {
                Ok(q) if q > 0 => Some(Some(q)),
                _ => {
                    v.push("quantity", "Quantity must be a positive number");
                    None
                }
            },
        };
        let prescribed = v.timestamp("prescribed", self.prescribed);

        match (medication, dosage, frequency, duration, quantity, prescribed) {
            (
                Some(medication),
                Some(dosage),
                Some(frequency),
                Some(duration),
                Some(quantity),
                Some(prescribed),
            ) if v.is_ok() => Ok(Prescription {
                id,
                patient,
                prescribed_by,
                medication,
                medication_id: non_blank(self.medication_id),
                quantity,
                dosage,
                frequency,
                duration,
                notes: non_blank(self.notes),
                prescribed: prescribed.unwrap_or(now),
                status: PrescriptionStatus::Pending,
                dispensed_at: None,
                dispensed_by: None,
                created_at: now,
            }),
            _ => Err(v.into_errors()),
        }
    }
}
