pub mod campaigns;
pub mod donations;

use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use tracing::error;

use rally_core::{CampaignService, DonationService, Error, SummaryService};
use rally_types::api::ErrorResponse;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub campaigns: CampaignService,
    pub donations: DonationService,
    pub summaries: SummaryService,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

/// Domain errors map to safe, specific messages; storage failures map to a
/// generic body with the raw error going to the log only. Ownership
/// failures answer exactly like absence.
pub(crate) fn map_error(err: Error) -> ApiError {
    let (status, message) = match &err {
        Error::Validation { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        Error::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        Error::Forbidden => (StatusCode::NOT_FOUND, "campaign not found".to_string()),
        Error::DuplicateSlug(_) | Error::DuplicateSignature(_) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        Error::Storage(db) => {
            error!("storage failure: {db}");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
        }
    };
    (status, Json(ErrorResponse { error: message }))
}

/// The services block on SQLite; run them off the async runtime.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: "internal error".to_string() }),
            )
        })?
        .map_err(map_error)
}
