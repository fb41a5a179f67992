//! In-process LRU tier with per-entry expiry.

use super::entry::CacheEntry;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

struct Slot {
    entry: CacheEntry,
    expires_at: Instant,
}

pub struct MemoryTier {
    entries: Mutex<LruCache<String, Slot>>,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Slot>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(slot) if slot.expires_at > Instant::now() => return Some(slot.entry.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    /// Inserts or overwrites; a zero TTL is a no-op.
    pub fn put(&self, key: &str, entry: CacheEntry, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let slot = Slot {
            entry,
            expires_at: Instant::now() + ttl,
        };
        self.lock().put(key.to_string(), slot);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().pop(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Live entries (expired ones still resident are not counted).
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().iter().filter(|(_, s)| s.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
