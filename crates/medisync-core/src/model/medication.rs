use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::non_blank;
use crate::error::{CoreError, Result};
use crate::validation::{ValidationErrors, Validator};

string_enum! {
    pub enum DosageForm ("dosage form") {
        Tablet => "tablet",
        Capsule => "capsule",
        Injection => "injection",
        Syrup => "syrup",
        Ointment => "ointment",
        Cream => "cream",
        Drops => "drops",
        Inhaler => "inhaler",
        Other => "other",
    }
}

string_enum! {
    pub enum StockAction ("stock action") {
        Add => "add",
        Subtract => "subtract",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub generic_name: String,
    pub category: String,
    pub dosage_form: DosageForm,
    pub strength: String,
    pub manufacturer: String,
    pub current_stock: u32,
    pub reorder_level: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_date: OffsetDateTime,
    pub batch_number: String,
    pub unit_price: f64,
    pub location: String,
    pub prescription_required: bool,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Medication {
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.reorder_level
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expiry_date < now
    }

    pub fn stock_value(&self) -> f64 {
        f64::from(self.current_stock) * self.unit_price
    }

    /// Adjust stock by `quantity`. Subtracting more than is on hand fails and
    /// leaves the stock untouched.
    pub fn apply_stock(
        &mut self,
        action: StockAction,
        quantity: u32,
        now: OffsetDateTime,
    ) -> Result<()> {
        self.current_stock = match action {
            StockAction::Add => self.current_stock.checked_add(quantity).ok_or_else(|| {
                CoreError::invalid_value("quantity", quantity.to_string())
            })?,
            StockAction::Subtract => self
                .current_stock
                .checked_sub(quantity)
                .ok_or_else(|| CoreError::insufficient_stock(self.current_stock, quantity))?,
        };
        self.updated_at = now;
        Ok(())
    }

    pub fn view(self, now: OffsetDateTime) -> MedicationView {
        MedicationView {
            low_stock: self.is_low_stock(),
            expired: self.is_expired(now),
            medication: self,
        }
    }
}

/// Response form of a medication with its derived flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationView {
    #[serde(flatten)]
    pub medication: Medication,
    pub low_stock: bool,
    pub expired: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationDraft {
    pub name: Option<String>,
    pub generic_name: Option<String>,
    pub category: Option<String>,
    pub dosage_form: Option<String>,
    pub strength: Option<String>,
    pub manufacturer: Option<String>,
    pub current_stock: Option<i64>,
    pub reorder_level: Option<i64>,
    pub expiry_date: Option<String>,
    pub batch_number: Option<String>,
    pub unit_price: Option<f64>,
    pub location: Option<String>,
    pub prescription_required: Option<bool>,
    pub notes: Option<String>,
}

impl MedicationDraft {
    pub fn into_medication(
        self,
        id: String,
        created_at: OffsetDateTime,
        updated_at: OffsetDateTime,
    ) -> std::result::Result<Medication, ValidationErrors> {
        let mut v = Validator::new();
        let name = v.required_str("name", self.name, "Please add a medication name");
        let generic_name =
            v.required_str("genericName", self.generic_name, "Please add a generic name");
        let category = v.required_str("category", self.category, "Please add a category");
        let dosage_form = match self.dosage_form {
            None => v.required::<DosageForm>("dosageForm", None, "Please add a dosage form"),
            raw => v.enumerated::<DosageForm>("dosageForm", raw, None),
        };
        let strength = v.required_str("strength", self.strength, "Please add strength");
        let manufacturer =
            v.required_str("manufacturer", self.manufacturer, "Please add a manufacturer");
        let current_stock = count(
            &mut v,
            "currentStock",
            self.current_stock,
            "Please add current stock",
            "Stock cannot be negative",
        );
        let reorder_level = count(
            &mut v,
            "reorderLevel",
            self.reorder_level,
            "Please add reorder level",
            "Reorder level cannot be negative",
        );
        let expiry_date =
            v.required_timestamp("expiryDate", self.expiry_date, "Please add expiry date");
        let batch_number =
            v.required_str("batchNumber", self.batch_number, "Please add batch number");
        let unit_price = v.required("unitPrice", self.unit_price, "Please add unit price");
        if let Some(price) = unit_price {
            v.check(
                price.is_finite() && price >= 0.0,
                "unitPrice",
                "Unit price cannot be negative",
            );
        }
        let location = v.required_str("location", self.location, "Please add storage location");

        match (
            name,
            generic_name,
            category,
            dosage_form,
            strength,
            manufacturer,
            current_stock,
            reorder_level,
            expiry_date,
            batch_number,
            unit_price,
            location,
        ) {
            (
                Some(name),
                Some(generic_name),
                Some(category),
                Some(dosage_form),
                Some(strength),
                Some(manufacturer),
                Some(current_stock),
                Some(reorder_level),
                Some(expiry_date),
                Some(batch_number),
                Some(unit_price),
                Some(location),
            ) if v.is_ok() => Ok(Medication {
                id,
                name,
                generic_name,
                category,
                dosage_form,
                strength,
                manufacturer,
                current_stock,
                reorder_level,
                expiry_date,
                batch_number,
                unit_price,
                location,
                prescription_required: self.prescription_required.unwrap_or(true),
                notes: non_blank(self.notes),
                created_at,
                updated_at,
            }),
            _ => Err(v.into_errors()),
        }
    }
}

fn count(
    v: &mut Validator,
    field: &str,
    value: Option<i64>,
    missing: &str,
    negative: &str,
) -> Option<u32> {
    let value = v.required(field, value, missing)?;
    match u32::try_from(value) {
        Ok(n) => Some(n),
        Err(_) => {
            v.push(field, if value < 0 { negative } else { "Value is too large" });
            None
        }
    }
}
