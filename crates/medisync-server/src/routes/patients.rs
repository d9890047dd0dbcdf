use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use medisync_api::{ApiError, ApiResponse};
use medisync_auth::{Action, AuthUser, Resource};
use medisync_core::model::{PatientDraft, Prescription, PrescriptionDraft};
use serde::Deserialize;
use serde_json::{Value, json};

use super::Body;
use crate::server::AppState;
use crate::services::patients::{DepartmentQueue, PatientFilters};

type Reply<T> = Result<ApiResponse<T>, ApiError>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/queue/{department_id}", get(queue))
        .route("/{id}", get(read).put(update).delete(remove))
        .route("/{id}/status", put(update_status))
        .route(
            "/{id}/prescriptions",
            get(prescriptions).post(add_prescription),
        )
}

#[derive(Debug, Default, Deserialize)]
struct StatusBody {
    status: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filters): Query<PatientFilters>,
) -> Reply<Vec<Value>> {
    user.require(Resource::Patients, Action::Read)?;
    Ok(ApiResponse::list(state.patients.list(&filters).await?))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Body(draft): Body<PatientDraft>,
) -> Reply<Value> {
    user.require(Resource::Patients, Action::Create)?;
    Ok(ApiResponse::created(state.patients.create(draft).await?))
}

async fn read(State(state): State<AppState>, user: AuthUser, Path(id): Path<String>) -> Reply<Value> {
    user.require(Resource::Patients, Action::Read)?;
    Ok(ApiResponse::ok(state.patients.get(&id).await?))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Body(patch): Body<Value>,
) -> Reply<Value> {
    user.require(Resource::Patients, Action::Update)?;
    Ok(ApiResponse::ok(state.patients.update(&id, patch).await?))
}

async fn remove(State(state): State<AppState>, user: AuthUser, Path(id): Path<String>) -> Reply<Value> {
    user.require(Resource::Patients, Action::Delete)?;
    state.patients.delete(&id).await?;
    Ok(ApiResponse::ok(json!({})))
}

async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Body(body): Body<StatusBody>,
) -> Reply<Value> {
    user.require(Resource::Patients, Action::UpdateStatus)?;
    Ok(ApiResponse::ok(
        state.patients.update_status(&id, body.status.as_deref()).await?,
    ))
}

async fn prescriptions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Reply<Vec<Prescription>> {
    user.require(Resource::Prescriptions, Action::Read)?;
    Ok(ApiResponse::list(state.patients.prescriptions(&id).await?))
}

async fn add_prescription(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Body(draft): Body<PrescriptionDraft>,
) -> Reply<Value> {
    user.require(Resource::Patients, Action::Prescribe)?;
    Ok(ApiResponse::created(
        state.patients.add_prescription(&id, draft, &user).await?,
    ))
}

async fn queue(
    State(state): State<AppState>,
    user: AuthUser,
    Path(department_id): Path<String>,
) -> Reply<DepartmentQueue> {
    user.require(Resource::Patients, Action::Read)?;
    Ok(ApiResponse::ok(state.patients.queue(&department_id).await?))
}
