use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use medisync_core::{CoreError, FieldError, ValidationErrors};
use medisync_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

mod response;

pub use response::ApiResponse;

/// When set, 500 responses carry the underlying error message instead of the
/// generic "Server Error". Enabled in development mode.
static ERROR_DETAIL: AtomicBool = AtomicBool::new(false);

pub fn set_error_detail(enabled: bool) {
    ERROR_DETAIL.store(enabled, Ordering::Relaxed);
}

pub fn error_detail_enabled() -> bool {
    ERROR_DETAIL.load(Ordering::Relaxed)
}

/// High-level API errors mapped to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn validation(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => msg.clone(),
            ApiError::Validation(errors) => errors.to_string(),
            ApiError::Internal(msg) if error_detail_enabled() => msg.clone(),
            ApiError::Internal(_) => "Server Error".to_string(),
        }
    }

    pub fn to_body(&self) -> ErrorBody<'_> {
        ErrorBody {
            success: false,
            message: self.public_message(),
            errors: match self {
                ApiError::Validation(errors) => Some(errors.errors()),
                _ => None,
            },
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<&'a [FieldError]>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed with internal error");
        }

        let body = match serde_json::to_vec(&self.to_body()) {
            Ok(b) => b,
            Err(_) => br#"{"success":false,"message":"Server Error"}"#.to_vec(),
        };

        let mut response = (status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}

/// Human label for a collection name, used in "not found" messages.
fn entity_label(collection: &str) -> &str {
    match collection {
        "patients" => "Patient",
        "departments" => "Department",
        "users" => "User",
        "operations" => "Operation",
        "medications" => "Medication",
        "prescriptions" => "Prescription",
        other => other,
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { collection, .. } => {
                ApiError::NotFound(format!("{} not found", entity_label(&collection)))
            }
            StorageError::AlreadyExists { collection, id } => ApiError::Conflict(format!(
                "{} {id} already exists",
                entity_label(&collection)
            )),
            StorageError::UniqueViolation {
                collection, field, ..
            } => ApiError::Conflict(format!(
                "{} with this {field} already exists",
                entity_label(&collection)
            )),
            StorageError::Precondition { message } => ApiError::BadRequest(message),
            err @ (StorageError::InvalidDocument { .. } | StorageError::Internal { .. }) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(errors) => ApiError::Validation(errors),
            CoreError::JsonError(e) => ApiError::Internal(e.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_json(err: &ApiError) -> serde_json::Value {
        serde_json::to_value(err.to_body()).unwrap()
    }

    #[test]
    fn into_response_sets_status_and_content_type() {
        let resp = ApiError::bad_request("Please provide status").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, &HeaderValue::from_static("application/json"));
    }

    #[test]
    fn api_error_variants_map_to_status() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (ApiError::bad_request("x"), StatusCode::BAD_REQUEST),
            (
                ApiError::validation(ValidationErrors::single("name", "Please add a name")),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (ApiError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases.into_iter() {
            assert_eq!(err.status_code(), status, "{err}");
        }
    }

    #[test]
    fn validation_body_lists_field_errors() {
        let err = ApiError::from(ValidationErrors::single("age", "Please add age"));
        let body = body_json(&err);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Please add age");
        assert_eq!(body["errors"][0]["field"], "age");

        let body = body_json(&ApiError::not_found("Patient not found"));
        assert!(body.get("errors").is_none());
    }

    #[test]
    fn internal_detail_is_hidden_unless_enabled() {
        let err = ApiError::internal("db exploded");
        set_error_detail(false);
        assert_eq!(err.public_message(), "Server Error");
        set_error_detail(true);
        assert_eq!(err.public_message(), "db exploded");
        set_error_detail(false);
    }

    #[test]
    fn storage_errors_map_to_http_semantics() {
        let cases: Vec<(StorageError, StatusCode, &str)> = vec![
            (
                StorageError::not_found("patients", "p1"),
                StatusCode::NOT_FOUND,
                "Patient not found",
            ),
            (
                StorageError::unique_violation("departments", "code", "CARD"),
                StatusCode::CONFLICT,
                "Department with this code already exists",
            ),
            (
                StorageError::precondition("Not enough stock available"),
                StatusCode::BAD_REQUEST,
                "Not enough stock available",
            ),
        ];
        for (err, status, message) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status_code(), status);
            assert_eq!(api.public_message(), message);
        }
        assert_eq!(
            ApiError::from(StorageError::internal("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn core_errors_are_client_errors() {
        let err = ApiError::from(CoreError::insufficient_stock(1, 2));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Not enough stock available");

        let err = ApiError::from(CoreError::invalid_transition("completed", "scheduled"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
