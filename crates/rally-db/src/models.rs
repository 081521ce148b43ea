//! Database row types — these map directly to SQLite rows. Distinct from the
//! rally-types API models to keep the storage layer independent; conversions
//! live here so parse fallbacks stay in one place.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use rally_types::models::{Campaign, Donation, User};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub wallet_address: String,
    pub display_name: Option<String>,
    pub profile_complete: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct CampaignRow {
    pub id: String,
    pub title: String,
    pub summary: Option<String>,
    pub description: String,
    pub goal_amount: f64,
    pub slug: String,
    pub end_date: String,
    pub category: String,
    pub media_url: Option<String>,
    pub owner_wallet: String,
    pub owner_user_id: String,
    pub matching_enabled: bool,
    pub matching_cap: Option<f64>,
    pub matching_sponsor: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct DonationRow {
    pub id: String,
    pub campaign_id: String,
    pub donor_user_id: Option<String>,
    pub amount: f64,
    pub transaction_signature: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateRow {
    pub count: i64,
    pub total: f64,
    pub largest: Option<f64>,
    pub smallest: Option<f64>,
    pub average: Option<f64>,
}

/// SQLite stores `datetime('now')` as "YYYY-MM-DD HH:MM:SS" without a
/// timezone, while values we write ourselves are RFC 3339. Accept both.
pub fn parse_timestamp(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{raw}' on {context}: {e}");
            DateTime::default()
        })
}

fn parse_id(raw: &str, context: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{raw}' on {context}: {e}");
        Uuid::default()
    })
}

impl UserRow {
    pub fn into_user(self) -> User {
        User {
            id: parse_id(&self.id, "user"),
            created_at: parse_timestamp(&self.created_at, "user"),
            updated_at: parse_timestamp(&self.updated_at, "user"),
            wallet_address: self.wallet_address,
            display_name: self.display_name,
            profile_complete: self.profile_complete,
        }
    }
}

impl CampaignRow {
    pub fn into_campaign(self) -> Campaign {
        Campaign {
            id: parse_id(&self.id, "campaign"),
            owner_user_id: parse_id(&self.owner_user_id, "campaign"),
            end_date: parse_timestamp(&self.end_date, "campaign"),
            created_at: parse_timestamp(&self.created_at, "campaign"),
            updated_at: parse_timestamp(&self.updated_at, "campaign"),
            title: self.title,
            summary: self.summary,
            description: self.description,
            goal_amount: self.goal_amount,
            slug: self.slug,
            category: self.category,
            media_url: self.media_url,
            owner_wallet: self.owner_wallet,
            matching_enabled: self.matching_enabled,
            matching_cap: self.matching_cap,
            matching_sponsor: self.matching_sponsor,
        }
    }
}

impl DonationRow {
    pub fn into_donation(self) -> Donation {
        Donation {
            id: parse_id(&self.id, "donation"),
            campaign_id: parse_id(&self.campaign_id, "donation"),
            donor_user_id: self.donor_user_id.as_deref().map(|id| parse_id(id, "donation")),
            created_at: parse_timestamp(&self.created_at, "donation"),
            amount: self.amount,
            transaction_signature: self.transaction_signature,
        }
    }
}
