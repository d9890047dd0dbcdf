use thiserror::Error;

use crate::validation::ValidationErrors;

/// Core error types for MediSync domain operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Invalid date/time: {0}")]
    InvalidDateTime(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Not enough stock available")]
    InsufficientStock { available: u32, requested: u32 },
}

impl CoreError {
    /// Create a new InvalidValue error
    pub fn invalid_value(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
        }
    }

    /// Create a new InvalidDateTime error
    pub fn invalid_date_time(message: impl Into<String>) -> Self {
        Self::InvalidDateTime(message.into())
    }

    /// Create a new InvalidTransition error
    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a new InsufficientStock error
    pub fn insufficient_stock(available: u32, requested: u32) -> Self {
        Self::InsufficientStock {
            available,
            requested,
        }
    }

    /// Check if this error was caused by caller input
    pub fn is_client_error(&self) -> bool {
        !matches!(self, CoreError::JsonError(_))
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::invalid_value("gender", "unknown");
        assert_eq!(err.to_string(), "Invalid value for gender: unknown");

        let err = CoreError::invalid_transition("completed", "scheduled");
        assert_eq!(
            err.to_string(),
            "Invalid status transition from completed to scheduled"
        );

        let err = CoreError::insufficient_stock(3, 10);
        assert_eq!(err.to_string(), "Not enough stock available");
    }

    #[test]
    fn test_client_error_classification() {
        assert!(CoreError::invalid_date_time("nope").is_client_error());
        assert!(CoreError::insufficient_stock(1, 5).is_client_error());
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!CoreError::from(json_err).is_client_error());
    }
}
