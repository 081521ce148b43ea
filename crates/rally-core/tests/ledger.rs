use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use rally_core::{CampaignService, DonationService, Error, LedgerCaches, SummaryService};
use rally_db::Database;
use rally_types::api::{CreateCampaignRequest, RecordDonationRequest, UpdateCampaignRequest};

struct Ledger {
    db: Arc<Database>,
    campaigns: CampaignService,
    donations: DonationService,
    summaries: SummaryService,
}

fn ledger() -> Ledger {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let caches = Arc::new(LedgerCaches::new());
    let summaries = SummaryService::new(db.clone(), caches.clone());
    let campaigns = CampaignService::new(db.clone(), caches.clone());
    let donations = DonationService::new(db.clone(), caches, summaries.clone());
    Ledger { db, campaigns, donations, summaries }
}

fn campaign_input(title: &str, wallet: &str) -> CreateCampaignRequest {
    CreateCampaignRequest {
        title: title.to_string(),
        summary: None,
        description: "A worthy cause".to_string(),
        goal_amount: 20.0,
        end_date: Utc::now() + Duration::days(30),
        category: "community".to_string(),
        media_url: None,
        wallet_address: wallet.to_string(),
        matching_enabled: false,
        matching_cap: None,
        matching_sponsor: None,
    }
}

fn donation_input(wallet: &str, amount: f64, signature: &str) -> RecordDonationRequest {
    RecordDonationRequest {
        wallet_address: wallet.to_string(),
        amount,
        transaction_signature: signature.to_string(),
        id: None,
    }
}

fn count_rows(db: &Database, sql: &str) -> i64 {
    db.with_conn(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
        .unwrap()
}

#[test]
fn create_derives_slug_from_title_and_suffixes_collisions() {
    let l = ledger();

    let first = l.campaigns.create(campaign_input("Help My Dog", "wallet-a")).unwrap();
    assert_eq!(first.slug, "help-my-dog");

    let second = l.campaigns.create(campaign_input("Help My Dog", "wallet-b")).unwrap();
    assert_eq!(second.slug, "help-my-dog-1");

    let read_back = l.campaigns.get_by_slug("help-my-dog").unwrap();
    assert_eq!(read_back.id, first.id);
    assert_eq!(read_back.title, "Help My Dog");
}

#[test]
fn create_sanitizes_description_and_summary() {
    let l = ledger();
    let mut input = campaign_input("Cleanup", "wallet-a");
    input.description = "<p>hello <script>alert(1)</script>world</p>".to_string();
    input.summary = Some("<b>short</b>".to_string());

    let campaign = l.campaigns.create(input).unwrap();
    assert_eq!(campaign.description, "hello alert(1)world");
    assert_eq!(campaign.summary.as_deref(), Some("short"));
}

#[test]
fn create_rejects_structural_garbage() {
    let l = ledger();

    let mut input = campaign_input("   ", "wallet-a");
    assert!(matches!(l.campaigns.create(input.clone()), Err(Error::Validation { .. })));

    input.title = "Fine".to_string();
    input.goal_amount = 0.0;
    assert!(matches!(l.campaigns.create(input), Err(Error::Validation { .. })));
}

#[test]
fn recording_a_donation_is_idempotent_on_the_signature() {
    let l = ledger();
    let campaign = l.campaigns.create(campaign_input("Well Drilling", "owner")).unwrap();
    let signature = "SIG123456789012345678901234567890";

    let first = l
        .donations
        .record(campaign.id, donation_input("donor-1", 1.5, signature))
        .unwrap();
    let second = l
        .donations
        .record(campaign.id, donation_input("donor-1", 1.5, signature))
        .unwrap();

    assert_eq!(first.donation.id, second.donation.id);
    assert_eq!(second.summary.donation_count, 1);
    assert_eq!(count_rows(&l.db, "SELECT COUNT(*) FROM donations"), 1);
}

#[test]
fn concurrent_same_signature_records_exactly_one_row() {
    let l = ledger();
    let campaign = l.campaigns.create(campaign_input("Storm Relief", "owner")).unwrap();
    let signature = "CONCURRENTSIG0123456789";

    let donations = l.donations.clone();
    let other = std::thread::spawn({
        let donations = donations.clone();
        let campaign_id = campaign.id;
        move || donations.record(campaign_id, donation_input("donor-x", 1.5, signature))
    });
    let mine = donations.record(campaign.id, donation_input("donor-x", 1.5, signature));
    let theirs = other.join().unwrap();

    assert!(mine.is_ok());
    assert!(theirs.is_ok());
    assert_eq!(mine.unwrap().donation.id, theirs.unwrap().donation.id);
    assert_eq!(count_rows(&l.db, "SELECT COUNT(*) FROM donations"), 1);
    assert_eq!(l.summaries.summary(campaign.id).unwrap().donation_count, 1);
}

#[test]
fn donor_user_is_created_once_per_wallet() {
    let l = ledger();
    let campaign = l.campaigns.create(campaign_input("Library Fund", "owner")).unwrap();

    l.donations
        .record(campaign.id, donation_input("repeat-donor", 2.0, "AAAA111122223333"))
        .unwrap();
    l.donations
        .record(campaign.id, donation_input("repeat-donor", 3.0, "BBBB111122223333"))
        .unwrap();

    assert_eq!(
        count_rows(&l.db, "SELECT COUNT(*) FROM users WHERE wallet_address = 'repeat-donor'"),
        1
    );
}

#[test]
fn record_rejects_bad_amounts_signatures_and_unknown_campaigns() {
    let l = ledger();
    let campaign = l.campaigns.create(campaign_input("Bike Racks", "owner")).unwrap();

    let zero = l.donations.record(campaign.id, donation_input("d", 0.0, "AAAA111122223333"));
    assert!(matches!(zero, Err(Error::Validation { .. })));

    let bad_sig = l.donations.record(campaign.id, donation_input("d", 1.0, "bad sig!"));
    assert!(matches!(bad_sig, Err(Error::Validation { .. })));

    let missing = l
        .donations
        .record(Uuid::new_v4(), donation_input("d", 1.0, "AAAA111122223333"));
    assert!(matches!(missing, Err(Error::NotFound(_))));

    assert_eq!(count_rows(&l.db, "SELECT COUNT(*) FROM donations"), 0);
}

#[test]
fn summary_always_matches_the_rows() {
    let l = ledger();
    let campaign = l.campaigns.create(campaign_input("Food Bank", "owner")).unwrap();

    l.donations.record(campaign.id, donation_input("d1", 1.5, "SIG1111222233334444")).unwrap();
    l.donations.record(campaign.id, donation_input("d2", 2.5, "SIG2222333344445555")).unwrap();
    let receipt = l
        .donations
        .record(campaign.id, donation_input("d3", 6.0, "SIG3333444455556666"))
        .unwrap();

    // the writer's own receipt reflects its write, no stale cache
    assert_eq!(receipt.summary.donation_count, 3);
    assert_eq!(receipt.summary.total_raised, 10.0);

    let summary = l.summaries.summary(campaign.id).unwrap();
    assert_eq!(summary.total_raised, 10.0);
    assert_eq!(summary.largest, 6.0);
    assert_eq!(summary.smallest, 1.5);
    assert!((summary.average - 10.0 / 3.0).abs() < 1e-9);
    // goal is 20.0
    assert_eq!(summary.funding_percentage, 50);
}

#[test]
fn summary_of_unknown_campaign_is_not_found() {
    let l = ledger();
    assert!(matches!(l.summaries.summary(Uuid::new_v4()), Err(Error::NotFound(_))));
}

#[test]
fn update_applies_only_present_fields_and_reallocates_slug() {
    let l = ledger();
    let campaign = l.campaigns.create(campaign_input("Old Title", "owner")).unwrap();
    assert_eq!(campaign.slug, "old-title");

    let patched = l
        .campaigns
        .update(
            campaign.id,
            UpdateCampaignRequest { goal_amount: Some(40.0), ..Default::default() },
        )
        .unwrap();
    assert_eq!(patched.title, "Old Title");
    assert_eq!(patched.slug, "old-title");
    assert_eq!(patched.goal_amount, 40.0);

    let renamed = l
        .campaigns
        .update(
            campaign.id,
            UpdateCampaignRequest { title: Some("New Title".to_string()), ..Default::default() },
        )
        .unwrap();
    assert_eq!(renamed.title, "New Title");
    assert_eq!(renamed.slug, "new-title");

    let pinned = l
        .campaigns
        .update(
            campaign.id,
            UpdateCampaignRequest {
                title: Some("Even Newer".to_string()),
                keep_existing_slug: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(pinned.title, "Even Newer");
    assert_eq!(pinned.slug, "new-title");
}

#[test]
fn update_of_missing_campaign_is_not_found() {
    let l = ledger();
    let result = l.campaigns.update(Uuid::new_v4(), UpdateCampaignRequest::default());
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn delete_removes_donations_before_the_campaign() {
    let l = ledger();
    let campaign = l.campaigns.create(campaign_input("Pop Up Garden", "owner")).unwrap();
    l.donations.record(campaign.id, donation_input("d1", 1.0, "SIGAAAA111122220")).unwrap();
    l.donations.record(campaign.id, donation_input("d2", 2.0, "SIGBBBB111122220")).unwrap();

    l.campaigns.delete(campaign.id, "owner").unwrap();

    assert_eq!(count_rows(&l.db, "SELECT COUNT(*) FROM campaigns"), 0);
    assert_eq!(count_rows(&l.db, "SELECT COUNT(*) FROM donations"), 0);
    assert!(matches!(l.campaigns.get(campaign.id), Err(Error::NotFound(_))));
}

#[test]
fn delete_by_a_foreign_wallet_changes_nothing() {
    let l = ledger();
    let campaign = l.campaigns.create(campaign_input("Mural", "wallet-a")).unwrap();
    l.donations.record(campaign.id, donation_input("d1", 5.0, "SIGCCCC111122220")).unwrap();

    let result = l.campaigns.delete(campaign.id, "wallet-b");
    assert!(matches!(result, Err(Error::Forbidden)));

    assert_eq!(count_rows(&l.db, "SELECT COUNT(*) FROM campaigns"), 1);
    assert_eq!(count_rows(&l.db, "SELECT COUNT(*) FROM donations"), 1);
}

#[test]
fn listings_reflect_writes_through_the_cache() {
    let l = ledger();
    l.campaigns.create(campaign_input("First", "wallet-a")).unwrap();
    assert_eq!(l.campaigns.list_all().unwrap().len(), 1);

    // a second create invalidates the cached listing
    let second = l.campaigns.create(campaign_input("Second", "wallet-b")).unwrap();
    let all = l.campaigns.list_all().unwrap();
    assert_eq!(all.len(), 2);

    assert_eq!(l.campaigns.list_by_owner("wallet-a").unwrap().len(), 1);
    assert_eq!(l.campaigns.list_by_owner("wallet-b").unwrap().len(), 1);
    assert_eq!(l.campaigns.list_by_owner("wallet-c").unwrap().len(), 0);

    // an update patches the cached full listing in place
    l.campaigns
        .update(
            second.id,
            UpdateCampaignRequest { title: Some("Second Act".to_string()), ..Default::default() },
        )
        .unwrap();
    let all = l.campaigns.list_all().unwrap();
    assert!(all.iter().any(|c| c.title == "Second Act"));
}

#[test]
fn donation_listings_by_campaign_and_wallet() {
    let l = ledger();
    let campaign = l.campaigns.create(campaign_input("Tree Planting", "owner")).unwrap();
    l.donations.record(campaign.id, donation_input("donor-a", 1.0, "SIGDDDD111122220")).unwrap();
    l.donations.record(campaign.id, donation_input("donor-b", 2.0, "SIGEEEE111122220")).unwrap();

    assert_eq!(l.donations.list_for_campaign(campaign.id).unwrap().len(), 2);
    let by_wallet = l.donations.list_for_wallet("donor-a").unwrap();
    assert_eq!(by_wallet.len(), 1);
    assert_eq!(by_wallet[0].amount, 1.0);

    // a new donation invalidates both listings
    l.donations.record(campaign.id, donation_input("donor-a", 3.0, "SIGFFFF111122220")).unwrap();
    assert_eq!(l.donations.list_for_campaign(campaign.id).unwrap().len(), 3);
    assert_eq!(l.donations.list_for_wallet("donor-a").unwrap().len(), 2);
}
