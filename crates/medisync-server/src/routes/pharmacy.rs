use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use medisync_api::{ApiError, ApiResponse};
use medisync_auth::{Action, AuthUser, Resource};
use medisync_core::model::{MedicationDraft, MedicationView};
use serde_json::{Value, json};

use super::Body;
use crate::server::AppState;
use crate::services::pharmacy::{MedicationFilters, PharmacyDashboard, StockChange};

type Reply<T> = Result<ApiResponse<T>, ApiError>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/dashboard", get(dashboard))
        .route("/{id}", get(read).put(update).delete(remove))
        .route("/{id}/stock", put(update_stock))
}

async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filters): Query<MedicationFilters>,
) -> Reply<Vec<MedicationView>> {
    user.require(Resource::Pharmacy, Action::Read)?;
    Ok(ApiResponse::list(state.pharmacy.list(&filters).await?))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Body(draft): Body<MedicationDraft>,
) -> Reply<MedicationView> {
    user.require(Resource::Pharmacy, Action::Create)?;
    Ok(ApiResponse::created(state.pharmacy.create(draft).await?))
}

async fn read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Reply<MedicationView> {
    user.require(Resource::Pharmacy, Action::Read)?;
    Ok(ApiResponse::ok(state.pharmacy.get(&id).await?))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Body(patch): Body<Value>,
) -> Reply<MedicationView> {
    user.require(Resource::Pharmacy, Action::Update)?;
    Ok(ApiResponse::ok(state.pharmacy.update(&id, patch).await?))
}

async fn remove(State(state): State<AppState>, user: AuthUser, Path(id): Path<String>) -> Reply<Value> {
    user.require(Resource::Pharmacy, Action::Delete)?;
    state.pharmacy.delete(&id).await?;
    Ok(ApiResponse::ok(json!({})))
}

async fn update_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Body(change): Body<StockChange>,
) -> Reply<MedicationView> {
    user.require(Resource::Pharmacy, Action::Stock)?;
    Ok(ApiResponse::ok(state.pharmacy.update_stock(&id, change).await?))
}

async fn dashboard(State(state): State<AppState>, user: AuthUser) -> Reply<PharmacyDashboard> {
    user.require(Resource::Pharmacy, Action::Read)?;
    Ok(ApiResponse::ok(state.pharmacy.dashboard().await?))
}
