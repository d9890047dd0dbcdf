use axum::Router;
use axum::extract::{Path, State};
use axum::routing::get;
use medisync_api::{ApiError, ApiResponse};
use medisync_auth::{Action, AuthUser, Resource};
use medisync_core::model::{Department, DepartmentDraft};
use serde_json::{Value, json};

use super::Body;
use crate::server::AppState;
use crate::services::departments::DepartmentStats;

type Reply<T> = Result<ApiResponse<T>, ApiError>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/stats", get(stats))
        .route("/{id}", get(read).put(update).delete(remove))
}

async fn list(State(state): State<AppState>, user: AuthUser) -> Reply<Vec<Department>> {
    user.require(Resource::Departments, Action::Read)?;
    Ok(ApiResponse::list(state.departments.list().await?))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Body(draft): Body<DepartmentDraft>,
) -> Reply<Department> {
    user.require(Resource::Departments, Action::Create)?;
    Ok(ApiResponse::created(state.departments.create(draft).await?))
}

async fn read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Reply<Department> {
    user.require(Resource::Departments, Action::Read)?;
    Ok(ApiResponse::ok(state.departments.get(&id).await?))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Body(patch): Body<Value>,
) -> Reply<Department> {
    user.require(Resource::Departments, Action::Update)?;
    Ok(ApiResponse::ok(state.departments.update(&id, patch).await?))
}

async fn remove(State(state): State<AppState>, user: AuthUser, Path(id): Path<String>) -> Reply<Value> {
    user.require(Resource::Departments, Action::Delete)?;
    state.departments.delete(&id).await?;
    Ok(ApiResponse::ok(json!({})))
}

async fn stats(State(state): State<AppState>, user: AuthUser) -> Reply<Vec<DepartmentStats>> {
    user.require(Resource::Departments, Action::Read)?;
    Ok(ApiResponse::list(state.departments.stats().await?))
}
