use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub wallet_address: String,
    pub display_name: Option<String>,
    pub profile_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub description: String,
    pub goal_amount: f64,
    pub slug: String,
    pub end_date: DateTime<Utc>,
    pub category: String,
    pub media_url: Option<String>,
    pub owner_wallet: String,
    pub owner_user_id: Uuid,
    pub matching_enabled: bool,
    pub matching_cap: Option<f64>,
    pub matching_sponsor: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A recorded pledge. Never mutated after insert; the transaction signature
/// is the idempotency key that collapses replays onto the original row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub donor_user_id: Option<Uuid>,
    pub amount: f64,
    pub transaction_signature: String,
    pub created_at: DateTime<Utc>,
}

/// Derived statistics over a campaign's donations. Always recomputed from
/// rows (or a cached snapshot within one TTL); never stored on the campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub campaign_id: Uuid,
    pub donation_count: u64,
    pub total_raised: f64,
    pub largest: f64,
    pub smallest: f64,
    pub average: f64,
    /// 0..=100, capped; 0 when the campaign has no positive goal.
    pub funding_percentage: u32,
}

/// What a donor gets back from recording a donation: the row that exists
/// (theirs, or the original on replay) plus post-write aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationReceipt {
    pub donation: Donation,
    pub summary: CampaignSummary,
}
