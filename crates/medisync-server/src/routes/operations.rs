use std::collections::BTreeMap;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use medisync_api::{ApiError, ApiResponse};
use medisync_auth::{Action, AuthUser, Resource};
use medisync_core::model::OperationDraft;
use serde_json::{Value, json};

use super::Body;
use crate::server::AppState;
use crate::services::operations::{OperationFilters, StatusChange, TheaterSchedule};

type Reply<T> = Result<ApiResponse<T>, ApiError>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/schedule", get(schedule))
        .route("/{id}", get(read).put(update).delete(remove))
        .route("/{id}/status", put(update_status))
}

async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filters): Query<OperationFilters>,
) -> Reply<Vec<Value>> {
    user.require(Resource::Operations, Action::Read)?;
    Ok(ApiResponse::list(state.operations.list(&filters).await?))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Body(draft): Body<OperationDraft>,
) -> Reply<Value> {
    user.require(Resource::Operations, Action::Create)?;
    Ok(ApiResponse::created(state.operations.create(draft).await?))
}

async fn read(State(state): State<AppState>, user: AuthUser, Path(id): Path<String>) -> Reply<Value> {
    user.require(Resource::Operations, Action::Read)?;
    Ok(ApiResponse::ok(state.operations.get(&id).await?))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Body(patch): Body<Value>,
) -> Reply<Value> {
    user.require(Resource::Operations, Action::Update)?;
    Ok(ApiResponse::ok(state.operations.update(&id, patch).await?))
}

async fn remove(State(state): State<AppState>, user: AuthUser, Path(id): Path<String>) -> Reply<Value> {
    user.require(Resource::Operations, Action::Delete)?;
    state.operations.delete(&id).await?;
    Ok(ApiResponse::ok(json!({})))
}

async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Body(change): Body<StatusChange>,
) -> Reply<Value> {
    user.require(Resource::Operations, Action::UpdateStatus)?;
    Ok(ApiResponse::ok(
        state.operations.update_status(&id, change).await?,
    ))
}

async fn schedule(
    State(state): State<AppState>,
    user: AuthUser,
) -> Reply<BTreeMap<String, TheaterSchedule>> {
    user.require(Resource::Operations, Action::Read)?;
    Ok(ApiResponse::ok(state.operations.schedule().await?))
}
