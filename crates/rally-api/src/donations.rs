use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use rally_types::api::RecordDonationRequest;

use crate::{ApiError, AppState, run_blocking};

pub async fn record_donation(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Json(req): Json<RecordDonationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.donations.clone();
    let receipt = run_blocking(move || service.record(campaign_id, req)).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_campaign_donations(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.donations.clone();
    let donations = run_blocking(move || service.list_for_campaign(campaign_id)).await?;
    Ok(Json(donations))
}

pub async fn list_wallet_donations(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.donations.clone();
    let donations = run_blocking(move || service.list_for_wallet(&wallet)).await?;
    Ok(Json(donations))
}

pub async fn campaign_summary(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.summaries.clone();
    let summary = run_blocking(move || service.summary(campaign_id)).await?;
    Ok(Json(summary))
}
