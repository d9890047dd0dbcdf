//! Explicit field validation for entity payloads.
//!
//! Every entity draft runs through a [`Validator`], which accumulates one
//! [`FieldError`] per offending field instead of stopping at the first
//! problem. The collected list is reported back to the caller verbatim.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::datetime::parse_timestamp;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Non-empty list of field errors produced by a failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![FieldError::new(field, message)])
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when any error refers to `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationErrors {}

/// Accumulates field errors while a draft is converted into an entity.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Record `message` against `field` unless `condition` holds.
    pub fn check(&mut self, condition: bool, field: &str, message: &str) {
        if !condition {
            self.push(field, message);
        }
    }

    pub fn required<T>(&mut self, field: &str, value: Option<T>, message: &str) -> Option<T> {
        if value.is_none() {
            self.push(field, message);
        }
        value
    }

    /// Required string: trimmed, and blank counts as missing.
    pub fn required_str(
        &mut self,
        field: &str,
        value: Option<String>,
        message: &str,
    ) -> Option<String> {
        let value = value
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self.required(field, value, message)
    }

    /// Parse an enumerated string field. Missing values fall back to `default`.
    pub fn enumerated<E>(&mut self, field: &str, value: Option<String>, default: Option<E>) -> Option<E>
    where
        E: FromStr<Err = String>,
    {
        match value {
            Some(raw) => match raw.trim().parse::<E>() {
                Ok(parsed) => Some(parsed),
                Err(message) => {
                    self.push(field, message);
                    None
                }
            },
            None => {
                if default.is_none() {
                    self.push(field, format!("Please add {field}"));
                }
                default
            }
        }
    }

    /// Parse an optional timestamp. `Some(None)` means absent and acceptable.
    pub fn timestamp(&mut self, field: &str, value: Option<String>) -> Option<Option<OffsetDateTime>> {
        match value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            None => Some(None),
            Some(raw) => match parse_timestamp(&raw) {
                Ok(dt) => Some(Some(dt)),
                Err(_) => {
                    self.push(field, format!("{field} must be an ISO 8601 date or timestamp"));
                    None
                }
            },
        }
    }

    pub fn required_timestamp(
        &mut self,
        field: &str,
        value: Option<String>,
        message: &str,
    ) -> Option<OffsetDateTime> {
        match self.timestamp(field, value) {
            Some(Some(dt)) => Some(dt),
            Some(None) => {
                self.push(field, message);
                None
            }
            None => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> ValidationErrors {
        ValidationErrors(self.errors)
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}
