//! Process-local, stale-tolerant TTL cache. Never a source of truth: every
//! write path that touches underlying rows deletes or overwrites the keys
//! derived from them, and a miss always falls back to a direct read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;

use rally_types::models::{Campaign, CampaignSummary, Donation};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct Entry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
    generation: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) > self.ttl
    }
}

/// One named cache namespace. Entries expire lazily on `get`; a `set` with
/// an explicit TTL additionally schedules a deferred eviction so stale
/// entries do not linger unread (skipped when no tokio runtime is running,
/// where lazy expiry still applies).
pub struct Cache<V> {
    name: &'static str,
    default_ttl: Duration,
    entries: Arc<RwLock<HashMap<String, Entry<V>>>>,
    generation: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    pub fn new(name: &'static str) -> Self {
        Self::with_default_ttl(name, DEFAULT_TTL)
    }

    pub fn with_default_ttl(name: &'static str, default_ttl: Duration) -> Self {
        Self {
            name,
            default_ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let map = self.read();
            match map.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: evict on access.
        let mut map = self.write();
        if map.get(key).is_some_and(|entry| entry.is_expired(now)) {
            map.remove(key);
            debug!("cache {}: expired '{key}' evicted on access", self.name);
        }
        None
    }

    pub fn set(&self, key: &str, value: V) {
        self.insert(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        let generation = self.insert(key, value, ttl);
        self.schedule_eviction(key.to_string(), ttl, generation);
    }

    pub fn delete(&self, key: &str) {
        self.write().remove(key);
    }

    /// Structured invalidation: drop every key under a prefix. Key schemas
    /// are namespaced exactly so this never has to scan for substrings.
    pub fn delete_prefix(&self, prefix: &str) {
        self.write().retain(|key, _| !key.starts_with(prefix));
    }

    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    fn insert(&self, key: &str, value: V, ttl: Duration) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        self.write().insert(
            key.to_string(),
            Entry { value, stored_at: Instant::now(), ttl, generation },
        );
        generation
    }

    /// Deferred eviction for an explicit-TTL entry. The generation check
    /// makes it a no-op when the key has been overwritten in the meantime.
    fn schedule_eviction(&self, key: String, ttl: Duration, generation: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let entries = Arc::clone(&self.entries);
        let name = self.name;
        handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut map = entries.write().unwrap_or_else(PoisonError::into_inner);
            if map.get(&key).is_some_and(|entry| entry.generation == generation) {
                map.remove(&key);
                debug!("cache {name}: '{key}' evicted by deferred sweep");
            }
        });
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry<V>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + Sync + 'static> Cache<Vec<T>> {
    /// Patch one element of a cached collection in place. No-op when the
    /// collection is not cached (the next read repopulates it anyway).
    pub fn patch_item<M, F>(&self, key: &str, matches: M, patch: F)
    where
        M: Fn(&T) -> bool,
        F: FnOnce(&mut T),
    {
        let mut map = self.write();
        if let Some(entry) = map.get_mut(key)
            && let Some(item) = entry.value.iter_mut().find(|item| matches(item))
        {
            patch(item);
        }
    }

    /// Replace the matching element, appending when no element matches, or
    /// seed a new single-element collection when the key is absent.
    pub fn upsert_item<M>(&self, key: &str, matches: M, item: T)
    where
        M: Fn(&T) -> bool,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let mut map = self.write();
        match map.get_mut(key) {
            Some(entry) => {
                if let Some(slot) = entry.value.iter_mut().find(|other| matches(other)) {
                    *slot = item;
                } else {
                    entry.value.push(item);
                }
            }
            None => {
                map.insert(
                    key.to_string(),
                    Entry {
                        value: vec![item],
                        stored_at: Instant::now(),
                        ttl: self.default_ttl,
                        generation,
                    },
                );
            }
        }
    }
}

/// The cache namespaces of the ledger, plus the key schema and the
/// per-write invalidation rules. Constructor-injected into the services so
/// tests can build an isolated instance.
pub struct LedgerCaches {
    /// Single campaigns, keyed `id:{id}` and `slug:{slug}`.
    pub campaigns: Cache<Campaign>,
    /// Campaign listings, keyed `all`, `owner:{wallet}`, `category:{cat}`.
    pub lists: Cache<Vec<Campaign>>,
    /// Donation summaries, keyed by campaign id.
    pub summaries: Cache<CampaignSummary>,
    /// Donation listings, keyed `campaign:{id}` and `wallet:{wallet}`.
    pub donations: Cache<Vec<Donation>>,
}

pub const LIST_ALL_KEY: &str = "all";

impl LedgerCaches {
    pub fn new() -> Self {
        Self {
            campaigns: Cache::new("campaigns"),
            lists: Cache::new("campaign-lists"),
            summaries: Cache::new("summaries"),
            donations: Cache::new("donations"),
        }
    }

    pub fn campaign_id_key(id: &Uuid) -> String {
        format!("id:{id}")
    }

    pub fn campaign_slug_key(slug: &str) -> String {
        format!("slug:{slug}")
    }

    pub fn owner_list_key(wallet: &str) -> String {
        format!("owner:{wallet}")
    }

    pub fn category_list_key(category: &str) -> String {
        format!("category:{category}")
    }

    pub fn campaign_donations_key(id: &Uuid) -> String {
        format!("campaign:{id}")
    }

    pub fn wallet_donations_key(wallet: &str) -> String {
        format!("wallet:{wallet}")
    }

    /// Listings that include or would include a campaign owned by `wallet`
    /// in `category`.
    pub fn invalidate_listings(&self, wallet: &str, category: &str) {
        self.lists.delete(LIST_ALL_KEY);
        self.lists.delete(&Self::owner_list_key(wallet));
        self.lists.delete(&Self::category_list_key(category));
    }

    /// Every key derived from one campaign's row.
    pub fn invalidate_campaign(&self, id: &Uuid, slug: &str) {
        self.campaigns.delete(&Self::campaign_id_key(id));
        self.campaigns.delete(&Self::campaign_slug_key(slug));
        self.summaries.delete(&id.to_string());
    }

    /// Keys whose values depend on one campaign's donation rows.
    pub fn invalidate_donations(&self, campaign_id: &Uuid, donor_wallet: &str) {
        self.donations.delete(&Self::campaign_donations_key(campaign_id));
        self.donations.delete(&Self::wallet_donations_key(donor_wallet));
        self.summaries.delete(&campaign_id.to_string());
    }

    /// Campaign deletion cascades over donations whose donors the key schema
    /// cannot enumerate, so every wallet listing goes too.
    pub fn invalidate_campaign_deleted(&self, id: &Uuid, slug: &str, wallet: &str, category: &str) {
        self.invalidate_campaign(id, slug);
        self.invalidate_listings(wallet, category);
        self.donations.delete(&Self::campaign_donations_key(id));
        self.donations.delete_prefix("wallet:");
    }
}

impl Default for LedgerCaches {
    fn default() -> Self {
        Self::new()
    }
}
