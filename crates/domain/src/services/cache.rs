use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use moka::sync::Cache;
use serde_json::Value;
use tokio::time::Instant;

/// A cached collection blob.
///
/// `dirty` marks a local write the config store has not confirmed yet, and
/// `pending` is set while that write is still being published. The version
/// increases with every store so a late confirmation can tell whether the
/// entry was overwritten in the meantime.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: Value,
    pub stored_at: Instant,
    pub dirty: bool,
    pub pending: bool,
    pub version: u64,
}

impl CacheEntry {
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }
}

/// Entry map keyed by config data id. Entries are never evicted by age:
/// the TTL only decides whether an entry is fresh enough to skip the network,
/// and stale entries remain available as a fallback when the store is down.
#[derive(Debug)]
pub struct CollectionCache {
    entries: Cache<String, CacheEntry>,
    ttl: Duration,
    next_version: AtomicU64,
    // Serializes check-then-insert updates.
    update: Mutex<()>,
}

impl CollectionCache {
    pub const DEFAULT_TTL: Duration = Duration::from_millis(60_000);
    pub const DEFAULT_CAPACITY: u64 = 64;

    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity.max(1)).build(),
            ttl,
            next_version: AtomicU64::new(1),
            update: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key)
    }

    /// Returns the value only if it is clean and younger than the TTL.
    pub fn fresh(&self, key: &str) -> Option<Value> {
        self.entries
            .get(key)
            .filter(|entry| !entry.dirty && entry.age() < self.ttl)
            .map(|entry| entry.value)
    }

    /// Records a value read from the config store, unless the entry changed
    /// since `seen_version` was observed or a publish is in flight. Returns
    /// whether the value was stored.
    pub fn store_fetched(&self, key: &str, value: Value, seen_version: Option<u64>) -> bool {
        let _update = self.lock_updates();
        let current = self.entries.get(key);
        if current.as_ref().map(|entry| entry.version) != seen_version {
            return false;
        }
        if current.is_some_and(|entry| entry.pending) {
            return false;
        }
        self.insert(key, value, false);
        true
    }

    /// Records an optimistic local write and returns its version. The entry
    /// stays pending until [`mark_clean`](Self::mark_clean) or
    /// [`publish_failed`](Self::publish_failed) settles it.
    pub fn store_dirty(&self, key: &str, value: Value) -> u64 {
        let _update = self.lock_updates();
        self.insert(key, value, true)
    }

    /// Clears the dirty flag if the entry still holds `version`. Returns
    /// `false` when a newer write replaced it.
    pub fn mark_clean(&self, key: &str, version: u64) -> bool {
        self.settle(key, version, |entry| {
            entry.dirty = false;
            entry.pending = false;
            entry.stored_at = Instant::now();
        })
    }

    /// The publish for `version` gave up: the entry stays dirty but a later
    /// fetch may replace it.
    pub fn publish_failed(&self, key: &str, version: u64) -> bool {
        self.settle(key, version, |entry| entry.pending = false)
    }

    fn settle(&self, key: &str, version: u64, apply: impl FnOnce(&mut CacheEntry)) -> bool {
        let _update = self.lock_updates();
        let Some(mut entry) = self.entries.get(key) else {
            return false;
        };
        if entry.version != version {
            return false;
        }
        apply(&mut entry);
        self.entries.insert(key.to_string(), entry);
        true
    }

    fn insert(&self, key: &str, value: Value, dirty: bool) -> u64 {
        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
                dirty,
                pending: dirty,
                version,
            },
        );
        version
    }

    fn lock_updates(&self) -> MutexGuard<'_, ()> {
        self.update.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CollectionCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
