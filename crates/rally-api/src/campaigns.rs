use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use rally_types::api::{CreateCampaignRequest, UpdateCampaignRequest};

use crate::{ApiError, AppState, run_blocking};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Restrict the listing to one owning wallet.
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub wallet_address: String,
}

pub async fn create_campaign(
    State(state): State<AppState>,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.campaigns.clone();
    let campaign = run_blocking(move || service.create(req)).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.campaigns.clone();
    let campaigns = run_blocking(move || match query.owner {
        Some(owner) => service.list_by_owner(&owner),
        None => service.list_all(),
    })
    .await?;
    Ok(Json(campaigns))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.campaigns.clone();
    let campaign = run_blocking(move || service.get_by_slug(&slug)).await?;
    Ok(Json(campaign))
}

pub async fn update_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateCampaignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.campaigns.clone();
    let campaign = run_blocking(move || service.update(id, patch)).await?;
    Ok(Json(campaign))
}

pub async fn delete_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.campaigns.clone();
    run_blocking(move || service.delete(id, &query.wallet_address)).await?;
    Ok(StatusCode::NO_CONTENT)
}
