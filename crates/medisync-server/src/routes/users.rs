use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use medisync_api::{ApiError, ApiResponse};
use medisync_auth::{Action, AuthUser, Resource};
use medisync_core::model::{PublicUser, UserDraft};
use serde_json::{Value, json};

use super::Body;
use crate::server::AppState;
use crate::services::users::{Credentials, LoginResponse};

type Reply<T> = Result<ApiResponse<T>, ApiError>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/profile", get(profile).put(update_profile))
        .route("/", get(list).post(create))
        .route("/{id}", get(read).put(update).delete(remove))
}

async fn login(
    State(state): State<AppState>,
    Body(credentials): Body<Credentials>,
) -> Result<Json<LoginResponse>, ApiError> {
    Ok(Json(state.users.login(credentials).await?))
}

async fn register(
    State(state): State<AppState>,
    Body(draft): Body<UserDraft>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    Ok((StatusCode::CREATED, Json(state.users.register(draft).await?)))
}

async fn profile(State(state): State<AppState>, user: AuthUser) -> Reply<PublicUser> {
    user.require(Resource::Profile, Action::Read)?;
    Ok(ApiResponse::ok(state.users.profile(&user).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Body(patch): Body<Value>,
) -> Reply<PublicUser> {
    user.require(Resource::Profile, Action::Update)?;
    Ok(ApiResponse::ok(state.users.update_profile(&user, patch).await?))
}

async fn list(State(state): State<AppState>, user: AuthUser) -> Reply<Vec<PublicUser>> {
    user.require(Resource::Users, Action::Read)?;
    Ok(ApiResponse::list(state.users.list().await?))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Body(draft): Body<UserDraft>,
) -> Reply<PublicUser> {
    user.require(Resource::Users, Action::Create)?;
    Ok(ApiResponse::created(state.users.create(draft).await?))
}

async fn read(State(state): State<AppState>, user: AuthUser, Path(id): Path<String>) -> Reply<PublicUser> {
    user.require(Resource::Users, Action::Read)?;
    Ok(ApiResponse::ok(state.users.get(&id).await?))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Body(patch): Body<Value>,
) -> Reply<PublicUser> {
    user.require(Resource::Users, Action::Update)?;
    Ok(ApiResponse::ok(state.users.update(&id, patch).await?))
}

async fn remove(State(state): State<AppState>, user: AuthUser, Path(id): Path<String>) -> Reply<Value> {
    user.require(Resource::Users, Action::Delete)?;
    state.users.delete(&id).await?;
    Ok(ApiResponse::ok(json!({})))
}
