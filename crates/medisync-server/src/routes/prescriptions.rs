use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use medisync_api::{ApiError, ApiResponse};
use medisync_auth::{Action, AuthUser, Resource};
use medisync_core::model::Prescription;

use crate::server::AppState;
use crate::services::prescriptions::PrescriptionFilters;

type Reply<T> = Result<ApiResponse<T>, ApiError>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}/dispense", put(dispense))
}

async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filters): Query<PrescriptionFilters>,
) -> Reply<Vec<Prescription>> {
    user.require(Resource::Prescriptions, Action::Read)?;
    Ok(ApiResponse::list(state.prescriptions.list(&filters).await?))
}

async fn dispense(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Reply<Prescription> {
    user.require(Resource::Prescriptions, Action::Dispense)?;
    Ok(ApiResponse::ok(state.prescriptions.dispense(&id, &user).await?))
}
