use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use rally_db::models::DonationRow;
use rally_db::{Database, queries};
use rally_types::api::RecordDonationRequest;
use rally_types::models::{Donation, DonationReceipt};

use crate::cache::LedgerCaches;
use crate::error::Error;
use crate::summary::SummaryService;

const SIGNATURE_MIN_LEN: usize = 16;
const SIGNATURE_MAX_LEN: usize = 128;

/// Donation write path. The transaction signature is the idempotency key:
/// a replay returns the original receipt, never an error, whether it is
/// caught by the pre-check or loses the unique-constraint race.
#[derive(Clone)]
pub struct DonationService {
    db: Arc<Database>,
    caches: Arc<LedgerCaches>,
    summaries: SummaryService,
}

impl DonationService {
    pub fn new(db: Arc<Database>, caches: Arc<LedgerCaches>, summaries: SummaryService) -> Self {
        Self { db, caches, summaries }
    }

    pub fn record(
        &self,
        campaign_id: Uuid,
        input: RecordDonationRequest,
    ) -> Result<DonationReceipt, Error> {
        if !(input.amount > 0.0) {
            return Err(Error::validation("amount", "must be positive"));
        }
        validate_signature(&input.transaction_signature)?;

        let campaign_key = campaign_id.to_string();
        if self.db.get_campaign(&campaign_key)?.is_none() {
            return Err(Error::NotFound("campaign"));
        }

        // replay of an already-recorded signature: success, original receipt
        if let Some(existing) = self
            .db
            .find_donation_by_signature(&input.transaction_signature)?
        {
            info!(
                "donation replay for signature '{}' on campaign {campaign_id}",
                input.transaction_signature
            );
            return self.receipt(existing.into_donation());
        }

        let inserted = self.db.with_tx(|tx| {
            let donor = queries::find_or_create_user(tx, &input.wallet_address)?;
            let row = DonationRow {
                id: input.id.unwrap_or_else(Uuid::new_v4).to_string(),
                campaign_id: campaign_key.clone(),
                donor_user_id: Some(donor.id),
                amount: input.amount,
                transaction_signature: input.transaction_signature.clone(),
                created_at: String::new(),
            };
            queries::insert_donation(tx, &row)?;
            queries::find_donation_by_signature(tx, &row.transaction_signature)?
                .ok_or(Error::NotFound("donation"))
        });

        let row = match inserted {
            Ok(row) => row,
            // lost a concurrent race on the signature: the winner's row is
            // the donation, and this call succeeded by proxy
            Err(Error::Storage(err))
                if err.unique_constraint() == Some("donations.transaction_signature") =>
            {
                self.db
                    .find_donation_by_signature(&input.transaction_signature)?
                    .ok_or(Error::NotFound("donation"))?
            }
            Err(err) => return Err(err),
        };

        self.caches.invalidate_donations(&campaign_id, &input.wallet_address);

        // fresh aggregates, bypassing the cache, so the caller never sees
        // totals that predate its own write
        let summary = self.summaries.refresh(campaign_id)?;
        Ok(DonationReceipt { donation: row.into_donation(), summary })
    }

    fn receipt(&self, donation: Donation) -> Result<DonationReceipt, Error> {
        let summary = self.summaries.summary(donation.campaign_id)?;
        Ok(DonationReceipt { donation, summary })
    }

    // -- Cached reads --

    pub fn list_for_campaign(&self, campaign_id: Uuid) -> Result<Vec<Donation>, Error> {
        let key = LedgerCaches::campaign_donations_key(&campaign_id);
        if let Some(list) = self.caches.donations.get(&key) {
            return Ok(list);
        }
        let list: Vec<Donation> = self
            .db
            .list_donations_by_campaign(&campaign_id.to_string())?
            .into_iter()
            .map(DonationRow::into_donation)
            .collect();
        self.caches.donations.set(&key, list.clone());
        Ok(list)
    }

    pub fn list_for_wallet(&self, wallet: &str) -> Result<Vec<Donation>, Error> {
        let key = LedgerCaches::wallet_donations_key(wallet);
        if let Some(list) = self.caches.donations.get(&key) {
            return Ok(list);
        }
        let list: Vec<Donation> = self
            .db
            .list_donations_by_wallet(wallet)?
            .into_iter()
            .map(DonationRow::into_donation)
            .collect();
        self.caches.donations.set(&key, list.clone());
        Ok(list)
    }
}

fn validate_signature(signature: &str) -> Result<(), Error> {
    let len_ok = (SIGNATURE_MIN_LEN..=SIGNATURE_MAX_LEN).contains(&signature.len());
    if len_ok && signature.bytes().all(|b| b.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(Error::validation(
            "transaction_signature",
            format!("expected {SIGNATURE_MIN_LEN}-{SIGNATURE_MAX_LEN} alphanumeric characters"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_format_gate() {
        assert!(validate_signature(&"a".repeat(16)).is_ok());
        assert!(validate_signature(&"Z9".repeat(64)).is_ok());
        assert!(validate_signature("short").is_err());
        assert!(validate_signature(&"a".repeat(129)).is_err());
        assert!(validate_signature("valid-length-but-has-hyphens").is_err());
        assert!(validate_signature("").is_err());
    }
}
