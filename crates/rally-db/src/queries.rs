use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use crate::Database;
use crate::error::DbError;
use crate::models::{AggregateRow, CampaignRow, DonationRow, UserRow};

// -- Users --

pub fn find_user_by_wallet(conn: &Connection, wallet: &str) -> Result<Option<UserRow>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, wallet_address, display_name, profile_complete, created_at, updated_at
         FROM users WHERE wallet_address = ?1",
    )?;
    stmt.query_row([wallet], user_from_row).optional()
}

pub fn insert_user(conn: &Connection, id: &str, wallet: &str) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO users (id, wallet_address) VALUES (?1, ?2)",
        params![id, wallet],
    )?;
    Ok(())
}

/// Find-or-create with the unique constraint on `wallet_address` as the
/// authority: the pre-check can lose a race with another writer, in which
/// case the insert fails with a unique violation and the row is re-read.
pub fn find_or_create_user(conn: &Connection, wallet: &str) -> Result<UserRow, DbError> {
    if let Some(user) = find_user_by_wallet(conn, wallet)? {
        return Ok(user);
    }

    let id = Uuid::new_v4().to_string();
    match insert_user(conn, &id, wallet) {
        Ok(()) => find_user_by_wallet(conn, wallet)?.ok_or(DbError::Storage(
            rusqlite::Error::QueryReturnedNoRows,
        )),
        Err(err) if err.unique_constraint() == Some("users.wallet_address") => {
            find_user_by_wallet(conn, wallet)?.ok_or(DbError::Storage(
                rusqlite::Error::QueryReturnedNoRows,
            ))
        }
        Err(err) => Err(err),
    }
}

// -- Campaigns --

const CAMPAIGN_COLUMNS: &str = "id, title, summary, description, goal_amount, slug, end_date, \
     category, media_url, owner_wallet, owner_user_id, matching_enabled, matching_cap, \
     matching_sponsor, created_at, updated_at";

pub fn insert_campaign(conn: &Connection, row: &CampaignRow) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO campaigns (id, title, summary, description, goal_amount, slug, end_date,
             category, media_url, owner_wallet, owner_user_id, matching_enabled, matching_cap,
             matching_sponsor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            row.id,
            row.title,
            row.summary,
            row.description,
            row.goal_amount,
            row.slug,
            row.end_date,
            row.category,
            row.media_url,
            row.owner_wallet,
            row.owner_user_id,
            row.matching_enabled,
            row.matching_cap,
            row.matching_sponsor,
        ],
    )?;
    Ok(())
}

pub fn get_campaign(conn: &Connection, id: &str) -> Result<Option<CampaignRow>, DbError> {
    let mut stmt =
        conn.prepare(&format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"))?;
    stmt.query_row([id], campaign_from_row).optional()
}

pub fn get_campaign_by_slug(conn: &Connection, slug: &str) -> Result<Option<CampaignRow>, DbError> {
    let mut stmt =
        conn.prepare(&format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE slug = ?1"))?;
    stmt.query_row([slug], campaign_from_row).optional()
}

pub fn list_campaigns(conn: &Connection) -> Result<Vec<CampaignRow>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY created_at DESC"
    ))?;
    let rows = stmt
        .query_map([], campaign_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_campaigns_by_owner(conn: &Connection, wallet: &str) -> Result<Vec<CampaignRow>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE owner_wallet = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt
        .query_map([wallet], campaign_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_campaign(conn: &Connection, row: &CampaignRow) -> Result<usize, DbError> {
    let changed = conn.execute(
        "UPDATE campaigns SET title = ?2, summary = ?3, description = ?4, goal_amount = ?5,
             slug = ?6, end_date = ?7, category = ?8, media_url = ?9, matching_enabled = ?10,
             matching_cap = ?11, matching_sponsor = ?12, updated_at = datetime('now')
         WHERE id = ?1",
        params![
            row.id,
            row.title,
            row.summary,
            row.description,
            row.goal_amount,
            row.slug,
            row.end_date,
            row.category,
            row.media_url,
            row.matching_enabled,
            row.matching_cap,
            row.matching_sponsor,
        ],
    )?;
    Ok(changed)
}

pub fn delete_campaign(conn: &Connection, id: &str) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM campaigns WHERE id = ?1", [id])?)
}

/// All slugs that could collide with `base` (the base itself or any
/// suffixed form), optionally excluding one campaign when renaming.
pub fn slugs_matching(
    conn: &Connection,
    base: &str,
    exclude_id: Option<&str>,
) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT slug FROM campaigns
         WHERE (slug = ?1 OR slug LIKE ?1 || '-%') AND id != ?2",
    )?;
    let rows = stmt
        .query_map(params![base, exclude_id.unwrap_or("")], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(rows)
}

// -- Donations --

pub fn insert_donation(conn: &Connection, row: &DonationRow) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO donations (id, campaign_id, donor_user_id, amount, transaction_signature)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            row.id,
            row.campaign_id,
            row.donor_user_id,
            row.amount,
            row.transaction_signature,
        ],
    )?;
    Ok(())
}

pub fn find_donation_by_signature(
    conn: &Connection,
    signature: &str,
) -> Result<Option<DonationRow>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, campaign_id, donor_user_id, amount, transaction_signature, created_at
         FROM donations WHERE transaction_signature = ?1",
    )?;
    stmt.query_row([signature], donation_from_row).optional()
}

pub fn list_donations_by_campaign(
    conn: &Connection,
    campaign_id: &str,
) -> Result<Vec<DonationRow>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, campaign_id, donor_user_id, amount, transaction_signature, created_at
         FROM donations WHERE campaign_id = ?1 ORDER BY created_at DESC",
    )?;
    let rows = stmt
        .query_map([campaign_id], donation_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_donations_by_wallet(
    conn: &Connection,
    wallet: &str,
) -> Result<Vec<DonationRow>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.campaign_id, d.donor_user_id, d.amount, d.transaction_signature,
                d.created_at
         FROM donations d
         JOIN users u ON d.donor_user_id = u.id
         WHERE u.wallet_address = ?1
         ORDER BY d.created_at DESC",
    )?;
    let rows = stmt
        .query_map([wallet], donation_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_donations_for_campaign(conn: &Connection, campaign_id: &str) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM donations WHERE campaign_id = ?1", [campaign_id])?)
}

/// Single aggregate pass over a campaign's donations.
pub fn donation_aggregates(conn: &Connection, campaign_id: &str) -> Result<AggregateRow, DbError> {
    let row = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(amount), 0), MAX(amount), MIN(amount), AVG(amount)
         FROM donations WHERE campaign_id = ?1",
        [campaign_id],
        |row| {
            Ok(AggregateRow {
                count: row.get(0)?,
                total: row.get(1)?,
                largest: row.get(2)?,
                smallest: row.get(3)?,
                average: row.get(4)?,
            })
        },
    )?;
    Ok(row)
}

// -- Row mappers --

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        wallet_address: row.get(1)?,
        display_name: row.get(2)?,
        profile_complete: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<CampaignRow> {
    Ok(CampaignRow {
        id: row.get(0)?,
        title: row.get(1)?,
        summary: row.get(2)?,
        description: row.get(3)?,
        goal_amount: row.get(4)?,
        slug: row.get(5)?,
        end_date: row.get(6)?,
        category: row.get(7)?,
        media_url: row.get(8)?,
        owner_wallet: row.get(9)?,
        owner_user_id: row.get(10)?,
        matching_enabled: row.get(11)?,
        matching_cap: row.get(12)?,
        matching_sponsor: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn donation_from_row(row: &Row<'_>) -> rusqlite::Result<DonationRow> {
    Ok(DonationRow {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        donor_user_id: row.get(2)?,
        amount: row.get(3)?,
        transaction_signature: row.get(4)?,
        created_at: row.get(5)?,
    })
}

// -- Read wrappers (retry-gated, served from the reader pool) --

impl Database {
    pub fn get_campaign(&self, id: &str) -> Result<Option<CampaignRow>, DbError> {
        self.read_retry("get campaign", |conn| get_campaign(conn, id))
    }

    pub fn get_campaign_by_slug(&self, slug: &str) -> Result<Option<CampaignRow>, DbError> {
        self.read_retry("get campaign by slug", |conn| get_campaign_by_slug(conn, slug))
    }

    pub fn list_campaigns(&self) -> Result<Vec<CampaignRow>, DbError> {
        self.read_retry("list campaigns", list_campaigns)
    }

    pub fn list_campaigns_by_owner(&self, wallet: &str) -> Result<Vec<CampaignRow>, DbError> {
        self.read_retry("list campaigns by owner", |conn| {
            list_campaigns_by_owner(conn, wallet)
        })
    }

    pub fn find_donation_by_signature(
        &self,
        signature: &str,
    ) -> Result<Option<DonationRow>, DbError> {
        self.read_retry("find donation by signature", |conn| {
            find_donation_by_signature(conn, signature)
        })
    }

    pub fn list_donations_by_campaign(&self, campaign_id: &str) -> Result<Vec<DonationRow>, DbError> {
        self.read_retry("list donations by campaign", |conn| {
            list_donations_by_campaign(conn, campaign_id)
        })
    }

    pub fn list_donations_by_wallet(&self, wallet: &str) -> Result<Vec<DonationRow>, DbError> {
        self.read_retry("list donations by wallet", |conn| {
            list_donations_by_wallet(conn, wallet)
        })
    }

    pub fn donation_aggregates(&self, campaign_id: &str) -> Result<AggregateRow, DbError> {
        self.read_retry("donation aggregates", |conn| donation_aggregates(conn, campaign_id))
    }
}

/// Extension for optional query results: no-rows becomes None instead of an
/// error.
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, DbError>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, DbError> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
