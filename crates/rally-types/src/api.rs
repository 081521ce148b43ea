use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Campaigns --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCampaignRequest {
    pub title: String,
    pub summary: Option<String>,
    pub description: String,
    pub goal_amount: f64,
    pub end_date: DateTime<Utc>,
    pub category: String,
    pub media_url: Option<String>,
    pub wallet_address: String,
    #[serde(default)]
    pub matching_enabled: bool,
    pub matching_cap: Option<f64>,
    pub matching_sponsor: Option<String>,
}

/// Partial update: absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCampaignRequest {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub goal_amount: Option<f64>,
    pub end_date: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub media_url: Option<String>,
    pub matching_enabled: Option<bool>,
    pub matching_cap: Option<f64>,
    pub matching_sponsor: Option<String>,
    /// When true, a title change does not reallocate the slug.
    #[serde(default)]
    pub keep_existing_slug: bool,
}

// -- Donations --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordDonationRequest {
    pub wallet_address: String,
    pub amount: f64,
    pub transaction_signature: String,
    pub id: Option<Uuid>,
}

// -- Errors --

/// Safe, user-visible error body. Storage failures always map to a generic
/// message; raw driver text never crosses this boundary.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
