use rusqlite::Connection;
use tracing::info;

use crate::error::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                TEXT PRIMARY KEY,
            wallet_address    TEXT NOT NULL UNIQUE,
            display_name      TEXT,
            profile_complete  INTEGER NOT NULL DEFAULT 0,
            created_at        TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS campaigns (
            id                TEXT PRIMARY KEY,
            title             TEXT NOT NULL,
            summary           TEXT,
            description       TEXT NOT NULL,
            goal_amount       REAL NOT NULL,
            slug              TEXT NOT NULL UNIQUE,
            end_date          TEXT NOT NULL,
            category          TEXT NOT NULL,
            media_url         TEXT,
            owner_wallet      TEXT NOT NULL,
            owner_user_id     TEXT NOT NULL REFERENCES users(id),
            matching_enabled  INTEGER NOT NULL DEFAULT 0,
            matching_cap      REAL,
            matching_sponsor  TEXT,
            created_at        TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_campaigns_owner
            ON campaigns(owner_wallet);
        CREATE INDEX IF NOT EXISTS idx_campaigns_category
            ON campaigns(category);

        CREATE TABLE IF NOT EXISTS donations (
            id                     TEXT PRIMARY KEY,
            campaign_id            TEXT NOT NULL REFERENCES campaigns(id),
            donor_user_id          TEXT REFERENCES users(id),
            amount                 REAL NOT NULL,
            transaction_signature  TEXT NOT NULL UNIQUE,
            created_at             TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_donations_campaign
            ON donations(campaign_id);
        CREATE INDEX IF NOT EXISTS idx_donations_donor
            ON donations(donor_user_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
