//! Controller logic for each resource family.
//!
//! Services own validation, persistence, reference population and event
//! publication. Route handlers stay thin: authorize, extract, call a service,
//! wrap the result in the response envelope.

pub mod departments;
pub mod operations;
pub mod patients;
pub mod pharmacy;
pub mod prescriptions;
pub mod users;

use medisync_api::ApiError;
use medisync_core::{day_bounds, now_utc, parse_date};
use medisync_storage::Filter;
use serde_json::Value;
use time::OffsetDateTime;

pub use departments::DepartmentService;
pub use operations::OperationService;
pub use patients::PatientService;
pub use pharmacy::PharmacyService;
pub use prescriptions::PrescriptionService;
pub use users::UserService;

pub type ApiResult<T> = Result<T, ApiError>;

/// Keys no update may overwrite.
pub(crate) const ALWAYS_PROTECTED: &[&str] = &["id", "createdAt"];

/// Merge a partial JSON update over a stored document.
///
/// Nested objects are merged key by key; everything else is replaced. Keys in
/// `protected` are ignored.
pub(crate) fn merge_update(stored: &mut Value, patch: Value, protected: &[&str]) -> ApiResult<()> {
    let Value::Object(patch) = patch else {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    };
    let Some(target) = stored.as_object_mut() else {
        return Err(ApiError::internal("stored document is not an object"));
    };
    for (key, value) in patch {
        if ALWAYS_PROTECTED.contains(&key.as_str()) || protected.contains(&key.as_str()) {
            continue;
        }
        let nested = value.is_object() && target.get(&key).is_some_and(Value::is_object);
        match target.get_mut(&key) {
            Some(existing) if nested => merge_update(existing, value, &[])?,
            _ => {
                target.insert(key, value);
            }
        }
    }
    Ok(())
}

/// `[start, end)` of the current UTC day.
pub(crate) fn today_bounds() -> (OffsetDateTime, OffsetDateTime) {
    day_bounds(now_utc().date())
}

/// Filter on a `YYYY-MM-DD` query parameter matching the whole UTC day.
pub(crate) fn date_filter(field: &str, date: Option<&str>) -> ApiResult<Option<Filter>> {
    match date.map(str::trim).filter(|d| !d.is_empty()) {
        None => Ok(None),
        Some(date) => {
            let date = parse_date(date).map_err(|_| {
                ApiError::bad_request(format!("Invalid date '{date}', expected YYYY-MM-DD"))
            })?;
            let (start, end) = day_bounds(date);
            Ok(Some(Filter::time_range(field, start, end)))
        }
    }
}

/// Parse an optional enum-valued query parameter.
pub(crate) fn enum_filter<E>(field: &str, value: Option<&str>) -> ApiResult<Option<Filter>>
where
    E: std::str::FromStr<Err = String> + std::fmt::Display,
{
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => {
            let parsed = raw.parse::<E>().map_err(ApiError::bad_request)?;
            Ok(Some(Filter::eq(field, parsed.to_string())))
        }
    }
}

/// Parse an optional `true`/`false` query parameter.
pub(crate) fn bool_param(name: &str, value: Option<&str>) -> ApiResult<Option<bool>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(other) => Err(ApiError::bad_request(format!(
            "Invalid value '{other}' for {name}, expected true or false"
        ))),
    }
}
