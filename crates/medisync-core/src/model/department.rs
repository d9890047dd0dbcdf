use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::non_blank;
use crate::token::department_prefix;
use crate::validation::{ValidationErrors, Validator};

pub const DEFAULT_MAX_DAILY_APPOINTMENTS: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub floor: String,
    pub wing: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub start: String,
    pub end: String,
}

impl Default for OperatingHours {
    fn default() -> Self {
        Self {
            start: "09:00".to_string(),
            end: "17:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub location: Location,
    pub head_doctor: Option<String>,
    pub contact_extension: Option<String>,
    pub operating_hours: OperatingHours,
    pub max_daily_appointments: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Department {
    /// Prefix used for patient queue tokens issued in this department.
    pub fn token_prefix(&self) -> String {
        department_prefix(&self.code, &self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationDraft {
    pub floor: Option<String>,
    pub wing: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperatingHoursDraft {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentDraft {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub location: Option<LocationDraft>,
    pub head_doctor: Option<String>,
    pub contact_extension: Option<String>,
    pub operating_hours: Option<OperatingHoursDraft>,
    pub max_daily_appointments: Option<i64>,
}

impl DepartmentDraft {
    pub fn into_department(
        self,
        id: String,
        created_at: OffsetDateTime,
    ) -> Result<Department, ValidationErrors> {
        let mut v = Validator::new();
        let name = v.required_str("name", self.name, "Please add a department name");
        let code = v.required_str("code", self.code, "Please add a department code");
        if let Some(code) = &code {
            v.check(
                code.chars().count() <= 5,
                "code",
                "Code cannot be more than 5 characters",
            );
        }

        let location = self.location.unwrap_or_default();
        let floor = v.required_str("location.floor", location.floor, "Please add a floor");
        let wing = v.required_str("location.wing", location.wing, "Please add a wing");

        let defaults = OperatingHours::default();
        let hours = self.operating_hours.unwrap_or_default();
        let operating_hours = OperatingHours {
            start: non_blank(hours.start).unwrap_or(defaults.start),
            end: non_blank(hours.end).unwrap_or(defaults.end),
        };

        let max_daily = self
            .max_daily_appointments
            .unwrap_or(i64::from(DEFAULT_MAX_DAILY_APPOINTMENTS));
        v.check(
            (1..=i64::from(u32::MAX)).contains(&max_daily),
            "maxDailyAppointments",
            "Max daily appointments must be a positive number",
        );

        match (name, code, floor, wing) {
            (Some(name), Some(code), Some(floor), Some(wing)) if v.is_ok() => Ok(Department {
                id,
                name,
                code,
                description: non_blank(self.description),
                location: Location { floor, wing },
                head_doctor: non_blank(self.head_doctor),
                contact_extension: non_blank(self.contact_extension),
                operating_hours,
                max_daily_appointments: max_daily as u32,
                created_at,
            }),
            _ => Err(v.into_errors()),
        }
    }
}
