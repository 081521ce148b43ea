use std::sync::Arc;

use uuid::Uuid;

use rally_db::Database;
use rally_db::models::AggregateRow;
use rally_types::models::CampaignSummary;

use crate::cache::LedgerCaches;
use crate::error::Error;

/// Read side of the ledger's aggregates: one `COUNT`/`SUM`/`MAX`/`MIN`/`AVG`
/// pass over a campaign's donations plus its goal, cached per campaign id.
#[derive(Clone)]
pub struct SummaryService {
    db: Arc<Database>,
    caches: Arc<LedgerCaches>,
}

impl SummaryService {
    pub fn new(db: Arc<Database>, caches: Arc<LedgerCaches>) -> Self {
        Self { db, caches }
    }

    /// Read-through: a cached snapshot no older than the TTL, otherwise a
    /// fresh computation.
    pub fn summary(&self, campaign_id: Uuid) -> Result<CampaignSummary, Error> {
        let key = campaign_id.to_string();
        if let Some(summary) = self.caches.summaries.get(&key) {
            return Ok(summary);
        }
        self.refresh(campaign_id)
    }

    /// Cache-bypassing recompute, re-seeding the cache. Called right after
    /// a donation commits so the writer's caller never sees stale totals.
    pub fn refresh(&self, campaign_id: Uuid) -> Result<CampaignSummary, Error> {
        let key = campaign_id.to_string();
        let campaign = self
            .db
            .get_campaign(&key)?
            .ok_or(Error::NotFound("campaign"))?;
        let aggregates = self.db.donation_aggregates(&key)?;

        let summary = build_summary(campaign_id, campaign.goal_amount, aggregates);
        self.caches.summaries.set(&key, summary.clone());
        Ok(summary)
    }
}

fn build_summary(campaign_id: Uuid, goal_amount: f64, agg: AggregateRow) -> CampaignSummary {
    let funding_percentage = if goal_amount > 0.0 {
        ((agg.total / goal_amount * 100.0).round() as i64).clamp(0, 100) as u32
    } else {
        0
    };

    CampaignSummary {
        campaign_id,
        donation_count: agg.count.max(0) as u64,
        total_raised: agg.total,
        largest: agg.largest.unwrap_or(0.0),
        smallest: agg.smallest.unwrap_or(0.0),
        average: agg.average.unwrap_or(0.0),
        funding_percentage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg(count: i64, total: f64) -> AggregateRow {
        AggregateRow {
            count,
            total,
            largest: Some(total),
            smallest: Some(total),
            average: Some(total),
        }
    }

    #[test]
    fn funding_percentage_is_rounded() {
        let summary = build_summary(Uuid::new_v4(), 300.0, agg(1, 100.0));
        assert_eq!(summary.funding_percentage, 33);
    }

    #[test]
    fn funding_percentage_caps_at_100() {
        let summary = build_summary(Uuid::new_v4(), 50.0, agg(3, 120.0));
        assert_eq!(summary.funding_percentage, 100);
    }

    #[test]
    fn zero_goal_means_zero_percent() {
        let summary = build_summary(Uuid::new_v4(), 0.0, agg(2, 40.0));
        assert_eq!(summary.funding_percentage, 0);
    }

    #[test]
    fn empty_campaign_summarizes_to_zeroes() {
        let summary = build_summary(Uuid::new_v4(), 100.0, AggregateRow::default());
        assert_eq!(summary.donation_count, 0);
        assert_eq!(summary.total_raised, 0.0);
        assert_eq!(summary.largest, 0.0);
        assert_eq!(summary.average, 0.0);
        assert_eq!(summary.funding_percentage, 0);
    }
}
