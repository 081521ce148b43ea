use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use rally_db::models::CampaignRow;
use rally_db::{Database, queries};
use rally_types::api::{CreateCampaignRequest, UpdateCampaignRequest};
use rally_types::models::Campaign;

use crate::cache::{LIST_ALL_KEY, LedgerCaches};
use crate::error::Error;
use crate::{sanitize, slug};

/// Campaign write path plus the cached read paths over campaign rows. All
/// multi-statement writes go through one transaction; the unique constraint
/// on `campaigns.slug` is the final authority for slug allocation.
#[derive(Clone)]
pub struct CampaignService {
    db: Arc<Database>,
    caches: Arc<LedgerCaches>,
}

impl CampaignService {
    pub fn new(db: Arc<Database>, caches: Arc<LedgerCaches>) -> Self {
        Self { db, caches }
    }

    /// Create a campaign for the owning wallet, lazily creating the owner's
    /// user row. A slug collision against a concurrent insert is absorbed
    /// with one retry on the random-suffix allocator; a second loss
    /// surfaces as `DuplicateSlug`.
    pub fn create(&self, input: CreateCampaignRequest) -> Result<Campaign, Error> {
        if input.title.trim().is_empty() {
            return Err(Error::validation("title", "must not be empty"));
        }
        if !(input.goal_amount > 0.0) {
            return Err(Error::validation("goal_amount", "must be positive"));
        }

        let description = sanitize::strip_markup(&input.description);
        let summary = input.summary.as_deref().map(sanitize::strip_markup);

        let row = match self.insert_campaign(&input, &description, summary.as_deref(), false) {
            Ok(row) => row,
            Err(Error::Storage(err)) if err.unique_constraint() == Some("campaigns.slug") => {
                warn!(
                    "slug collision creating '{}', retrying with a random suffix",
                    input.title
                );
                match self.insert_campaign(&input, &description, summary.as_deref(), true) {
                    Ok(row) => row,
                    Err(Error::Storage(err))
                        if err.unique_constraint() == Some("campaigns.slug") =>
                    {
                        return Err(Error::DuplicateSlug(slug::slugify(&input.title)));
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(err) => return Err(err),
        };

        self.caches.invalidate_listings(&row.owner_wallet, &row.category);
        info!("Campaign '{}' created with slug '{}'", row.title, row.slug);
        Ok(row.into_campaign())
    }

    fn insert_campaign(
        &self,
        input: &CreateCampaignRequest,
        description: &str,
        summary: Option<&str>,
        random_slug: bool,
    ) -> Result<CampaignRow, Error> {
        self.db.with_tx(|tx| {
            let owner = queries::find_or_create_user(tx, &input.wallet_address)?;
            let allocated = if random_slug {
                slug::allocate_random(tx, &input.title)?
            } else {
                slug::allocate(tx, &input.title, None)?
            };

            let id = Uuid::new_v4().to_string();
            let row = CampaignRow {
                id: id.clone(),
                title: input.title.clone(),
                summary: summary.map(str::to_string),
                description: description.to_string(),
                goal_amount: input.goal_amount,
                slug: allocated,
                end_date: input.end_date.to_rfc3339(),
                category: input.category.clone(),
                media_url: input.media_url.clone(),
                owner_wallet: input.wallet_address.clone(),
                owner_user_id: owner.id,
                matching_enabled: input.matching_enabled,
                matching_cap: input.matching_cap,
                matching_sponsor: input.matching_sponsor.clone(),
                created_at: String::new(),
                updated_at: String::new(),
            };
            queries::insert_campaign(tx, &row)?;
            // re-read for the database-assigned timestamps
            queries::get_campaign(tx, &id)?.ok_or(Error::NotFound("campaign"))
        })
    }

    /// Apply only the fields present in `patch`. A title change reallocates
    /// the slug unless the caller pinned it; `updated_at` always bumps.
    pub fn update(&self, id: Uuid, patch: UpdateCampaignRequest) -> Result<Campaign, Error> {
        if let Some(goal) = patch.goal_amount
            && !(goal > 0.0)
        {
            return Err(Error::validation("goal_amount", "must be positive"));
        }

        let id_str = id.to_string();
        let old = self
            .db
            .get_campaign(&id_str)?
            .ok_or(Error::NotFound("campaign"))?;

        let row = self.db.with_tx(|tx| {
            let mut row = queries::get_campaign(tx, &id_str)?.ok_or(Error::NotFound("campaign"))?;

            if let Some(title) = &patch.title {
                if *title != row.title && !patch.keep_existing_slug {
                    row.slug = slug::allocate(tx, title, Some(&id_str))?;
                }
                row.title = title.clone();
            }
            if let Some(summary) = &patch.summary {
                row.summary = Some(sanitize::strip_markup(summary));
            }
            if let Some(description) = &patch.description {
                row.description = sanitize::strip_markup(description);
            }
            if let Some(goal) = patch.goal_amount {
                row.goal_amount = goal;
            }
            if let Some(end_date) = patch.end_date {
                row.end_date = end_date.to_rfc3339();
            }
            if let Some(category) = &patch.category {
                row.category = category.clone();
            }
            if let Some(media_url) = &patch.media_url {
                row.media_url = Some(media_url.clone());
            }
            if let Some(enabled) = patch.matching_enabled {
                row.matching_enabled = enabled;
            }
            if let Some(cap) = patch.matching_cap {
                row.matching_cap = Some(cap);
            }
            if let Some(sponsor) = &patch.matching_sponsor {
                row.matching_sponsor = Some(sponsor.clone());
            }

            queries::update_campaign(tx, &row)?;
            queries::get_campaign(tx, &id_str)?.ok_or(Error::NotFound("campaign"))
        })?;

        self.caches.invalidate_campaign(&id, &old.slug);
        self.caches.campaigns.delete(&LedgerCaches::campaign_slug_key(&row.slug));
        self.caches.lists.delete(&LedgerCaches::owner_list_key(&row.owner_wallet));
        self.caches.lists.delete(&LedgerCaches::category_list_key(&old.category));
        self.caches.lists.delete(&LedgerCaches::category_list_key(&row.category));

        let campaign = row.into_campaign();
        // patch the full listing in place instead of dropping it
        let patched = campaign.clone();
        self.caches
            .lists
            .patch_item(LIST_ALL_KEY, |c| c.id == id, move |slot| *slot = patched);
        Ok(campaign)
    }

    /// Delete a campaign and its donations, children first. Only the owning
    /// wallet may delete; anyone else gets an answer indistinguishable from
    /// the campaign not existing.
    pub fn delete(&self, id: Uuid, owner_wallet: &str) -> Result<(), Error> {
        let id_str = id.to_string();
        let row = self
            .db
            .get_campaign(&id_str)?
            .ok_or(Error::NotFound("campaign"))?;
        if row.owner_wallet != owner_wallet {
            return Err(Error::Forbidden);
        }

        self.db.with_tx(|tx| {
            let donations = queries::delete_donations_for_campaign(tx, &id_str)?;
            let removed = queries::delete_campaign(tx, &id_str)?;
            if removed == 0 {
                return Err(Error::NotFound("campaign"));
            }
            info!("Campaign {id} deleted along with {donations} donations");
            Ok(())
        })?;

        self.caches
            .invalidate_campaign_deleted(&id, &row.slug, &row.owner_wallet, &row.category);
        Ok(())
    }

    // -- Cached reads --

    pub fn get_by_slug(&self, slug_value: &str) -> Result<Campaign, Error> {
        let key = LedgerCaches::campaign_slug_key(slug_value);
        if let Some(campaign) = self.caches.campaigns.get(&key) {
            return Ok(campaign);
        }
        let row = self
            .db
            .get_campaign_by_slug(slug_value)?
            .ok_or(Error::NotFound("campaign"))?;
        let campaign = row.into_campaign();
        self.caches.campaigns.set(&key, campaign.clone());
        self.caches
            .campaigns
            .set(&LedgerCaches::campaign_id_key(&campaign.id), campaign.clone());
        Ok(campaign)
    }

    pub fn get(&self, id: Uuid) -> Result<Campaign, Error> {
        let key = LedgerCaches::campaign_id_key(&id);
        if let Some(campaign) = self.caches.campaigns.get(&key) {
            return Ok(campaign);
        }
        let row = self
            .db
            .get_campaign(&id.to_string())?
            .ok_or(Error::NotFound("campaign"))?;
        let campaign = row.into_campaign();
        self.caches.campaigns.set(&key, campaign.clone());
        Ok(campaign)
    }

    pub fn list_all(&self) -> Result<Vec<Campaign>, Error> {
        if let Some(list) = self.caches.lists.get(LIST_ALL_KEY) {
            return Ok(list);
        }
        let list: Vec<Campaign> = self
            .db
            .list_campaigns()?
            .into_iter()
            .map(CampaignRow::into_campaign)
            .collect();
        self.caches.lists.set(LIST_ALL_KEY, list.clone());
        Ok(list)
    }

    pub fn list_by_owner(&self, wallet: &str) -> Result<Vec<Campaign>, Error> {
        let key = LedgerCaches::owner_list_key(wallet);
        if let Some(list) = self.caches.lists.get(&key) {
            return Ok(list);
        }
        let list: Vec<Campaign> = self
            .db
            .list_campaigns_by_owner(wallet)?
            .into_iter()
            .map(CampaignRow::into_campaign)
            .collect();
        self.caches.lists.set(&key, list.clone());
        Ok(list)
    }
}
