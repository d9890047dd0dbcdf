//! HTTP routes under `/api`.
//!
//! Every handler authenticates through [`medisync_auth::AuthUser`] (login and
//! registration excepted), checks the policy table, then hands off to the
//! resource's service.

pub mod departments;
pub mod operations;
pub mod patients;
pub mod pharmacy;
pub mod prescriptions;
pub mod users;

use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::routing::get;
use axum::Json;
use medisync_api::ApiError;
use serde::de::DeserializeOwned;

use crate::realtime;
use crate::server::AppState;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/api/users", users::router())
        .nest("/api/patients", patients::router())
        .nest("/api/operations", operations::router())
        .nest("/api/pharmacy", pharmacy::router())
        .nest("/api/departments", departments::router())
        .nest("/api/prescriptions", prescriptions::router())
        .route("/api/realtime", get(realtime::realtime_handler))
}

/// JSON request body whose rejections use the API error envelope.
#[derive(Debug, Clone)]
pub struct Body<T>(pub T);

impl<S, T> FromRequest<S> for Body<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Body(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::bad_request("Expected request with `Content-Type: application/json`")
        }
        other => ApiError::bad_request(format!("Invalid JSON body: {}", other.body_text())),
    }
}
