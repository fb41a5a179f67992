//! Distributed cache backends.
//!
//! The distributed tier talks to a shared key-value store through
//! [`DistributedCacheBackend`]. Any product with get/set-with-TTL/delete semantics fits;
//! [`InMemoryBackend`] serves tests and single-process deployments, [`NullBackend`] turns
//! the tier off.

use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;

#[async_trait]
pub trait DistributedCacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()>;
    /// Deletes `keys`, returning how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64>;
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn flush_all(&self) -> Result<()>;

    /// Keys starting with `prefix`. Backends without key scans return nothing.
    async fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str;
}

#[derive(Clone)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Instant,
    last_accessed: Instant,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local stand-in for a shared store.
pub struct InMemoryBackend {
    entries: Arc<RwLock<HashMap<String, StoredValue>>>,
    max_entries: usize,
}

impl InMemoryBackend {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries: max_entries.max(1),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, StoredValue>> {
        self.entries.write().unwrap_or_else(|p| p.into_inner())
    }

    fn evict_if_needed(&self, entries: &mut HashMap<String, StoredValue>, now: Instant) {
        entries.retain(|_, e| !e.is_expired(now));
        while entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    entries.remove(&k);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl DistributedCacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut entries = self.write();
        if let Some(entry) = entries.get_mut(key) {
            if entry.is_expired(now) {
                entries.remove(key);
                return Ok(None);
            }
            entry.last_accessed = now;
            return Ok(Some(entry.data.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.write();
        if !entries.contains_key(key) {
            self.evict_if_needed(&mut entries, now);
        }
        entries.insert(
            key.to_string(),
            StoredValue {
                data: value.to_vec(),
                expires_at: now + Duration::from_secs(ttl_secs),
                last_accessed: now,
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        let mut entries = self.write();
        Ok(keys.iter().filter(|k| entries.remove(k.as_str()).is_some()).count() as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        Ok(entries.get(key).map(|e| !e.is_expired(now)).unwrap_or(false))
    }

    async fn flush_all(&self) -> Result<()> {
        self.write().clear();
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

/// Disables the distributed tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

#[async_trait]
impl DistributedCacheBackend for NullBackend {
    async fn get(&self, _: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn set(&self, _: &str, _: &[u8], _: u64) -> Result<()> {
        Ok(())
    }
    async fn del(&self, _: &[String]) -> Result<u64> {
        Ok(0)
    }
    async fn exists(&self, _: &str) -> Result<bool> {
        Ok(false)
    }
    async fn flush_all(&self) -> Result<()> {
        Ok(())
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_in_memory_ttl() {
        let b = InMemoryBackend::new(10);
        b.set("k", b"v", 2).await.unwrap();
        assert!(b.exists("k").await.unwrap());
        assert_eq!(b.get("k").await.unwrap().as_deref(), Some(&b"v"[..]));
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(b.get("k").await.unwrap(), None);
        assert!(!b.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_del_counts_existing_keys() {
        let b = InMemoryBackend::new(10);
        b.set("a", b"1", 60).await.unwrap();
        b.set("b", b"2", 60).await.unwrap();
        let n = b
            .del(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert!(b.is_empty());
    }

    #[tokio::test]
    async fn test_keys_with_prefix_and_flush() {
        let b = InMemoryBackend::new(10);
        b.set("ns:sem:1", b"1", 60).await.unwrap();
        b.set("ns:sem:2", b"2", 60).await.unwrap();
        b.set("ns:other:1", b"3", 60).await.unwrap();
        assert_eq!(
            b.keys_with_prefix("ns:sem:").await.unwrap(),
            vec!["ns:sem:1".to_string(), "ns:sem:2".to_string()]
        );
        b.flush_all().await.unwrap();
        assert_eq!(b.len(), 0);
    }

    #[tokio::test]
    async fn test_eviction_respects_capacity() {
        let b = InMemoryBackend::new(2);
        b.set("a", b"1", 60).await.unwrap();
        b.set("b", b"2", 60).await.unwrap();
        b.set("c", b"3", 60).await.unwrap();
        assert_eq!(b.len(), 2);
    }

    #[tokio::test]
    async fn test_null_backend() {
        let b = NullBackend;
        b.set("k", b"v", 60).await.unwrap();
        assert_eq!(b.get("k").await.unwrap(), None);
        assert_eq!(b.name(), "null");
    }
}
