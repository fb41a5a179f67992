//! The three-tier response cache consulted before any provider call.

use super::backend::{DistributedCacheBackend, NullBackend};
use super::entry::CacheEntry;
use super::key::{CacheKeyGenerator, TieredKey};
use super::memory::MemoryTier;
use super::metrics::{CacheMetrics, CacheStats, CacheTier};
use super::ttl::{TtlClass, TtlPolicy};
use crate::types::{ChatRequest, ChatResponse};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Prefix of every distributed-tier key.
    pub namespace: String,
    pub pattern_capacity: usize,
    pub memory_capacity: usize,
    /// Serialized-size ceiling for distributed entries; larger ones are truncated.
    pub max_entry_bytes: usize,
    pub ttl: TtlPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "ai-cache".into(),
            pattern_capacity: 1_000,
            memory_capacity: 5_000,
            max_entry_bytes: 512 * 1024,
            ttl: TtlPolicy::default(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_capacities(mut self, pattern: usize, memory: usize) -> Self {
        self.pattern_capacity = pattern;
        self.memory_capacity = memory;
        self
    }

    pub fn with_max_entry_bytes(mut self, bytes: usize) -> Self {
        self.max_entry_bytes = bytes;
        self
    }

    pub fn with_ttl_policy(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Extension point for near-duplicate lookup on the distributed tier, consulted after an
/// exact distributed miss.
#[async_trait]
pub trait SimilarityMatcher: Send + Sync {
    async fn find_similar(
        &self,
        key: &TieredKey,
        keys: &CacheKeyGenerator,
        backend: &dyn DistributedCacheBackend,
    ) -> Option<CacheEntry>;
}

/// Never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSimilarity;

#[async_trait]
impl SimilarityMatcher for NoSimilarity {
    async fn find_similar(
        &self,
        _key: &TieredKey,
        _keys: &CacheKeyGenerator,
        _backend: &dyn DistributedCacheBackend,
    ) -> Option<CacheEntry> {
        None
    }
}

/// Matches any live distributed entry sharing the request's semantic key, i.e. the same
/// normalized prompt under the same scope but a different exact hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemanticPrefixMatcher;

#[async_trait]
impl SimilarityMatcher for SemanticPrefixMatcher {
    async fn find_similar(
        &self,
        key: &TieredKey,
        keys: &CacheKeyGenerator,
        backend: &dyn DistributedCacheBackend,
    ) -> Option<CacheEntry> {
        let candidates = backend
            .keys_with_prefix(&keys.semantic_prefix(&key.semantic))
            .await
            .ok()?;
        for candidate in candidates {
            if candidate == key.distributed {
                continue;
            }
            if let Ok(Some(bytes)) = backend.get(&candidate).await {
                if let Ok(entry) = CacheEntry::from_bytes(&bytes) {
                    if entry.remaining().is_some() {
                        return Some(entry);
                    }
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub entry: CacheEntry,
    pub tier: CacheTier,
}

pub struct CacheHierarchy {
    config: CacheConfig,
    keys: CacheKeyGenerator,
    pattern: MemoryTier,
    memory: MemoryTier,
    distributed: Arc<dyn DistributedCacheBackend>,
    matcher: Arc<dyn SimilarityMatcher>,
    metrics: CacheMetrics,
}

impl CacheHierarchy {
    /// Pattern and memory tiers only; the distributed tier is a [`NullBackend`].
    pub fn new(config: CacheConfig) -> Self {
        Self {
            keys: CacheKeyGenerator::new(config.namespace.clone()),
            pattern: MemoryTier::new(config.pattern_capacity),
            memory: MemoryTier::new(config.memory_capacity),
            distributed: Arc::new(NullBackend),
            matcher: Arc::new(NoSimilarity),
            metrics: CacheMetrics::default(),
            config,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn DistributedCacheBackend>) -> Self {
        self.distributed = backend;
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn SimilarityMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.config.ttl
    }

    pub fn backend_name(&self) -> &'static str {
        self.distributed.name()
    }

    pub fn key_for(&self, request: &ChatRequest) -> TieredKey {
        self.keys.generate(request)
    }

    pub async fn lookup(&self, request: &ChatRequest) -> Option<CacheHit> {
        if !self.config.enabled {
            return None;
        }
        let key = self.key_for(request);
        self.lookup_key(&key).await
    }

    /// First hit wins; tiers above the hit are backfilled with the entry's remaining TTL.
    pub async fn lookup_key(&self, key: &TieredKey) -> Option<CacheHit> {
        if !self.config.enabled {
            return None;
        }
        let started = Instant::now();
        let hit = self.find(key).await;
        self.metrics.record_lookup(hit.is_some(), started.elapsed());
        match &hit {
            Some(h) => debug!(tier = %h.tier, semantic_key = %key.semantic, "cache hit"),
            None => debug!(semantic_key = %key.semantic, "cache miss"),
        }
        hit
    }

    async fn find(&self, key: &TieredKey) -> Option<CacheHit> {
        if let Some(pattern) = &key.pattern {
            let t = Instant::now();
            let found = self.pattern.get(pattern);
            self.metrics
                .record_tier(CacheTier::Pattern, found.is_some(), t.elapsed());
            if let Some(entry) = found {
                return Some(CacheHit {
                    entry,
                    tier: CacheTier::Pattern,
                });
            }
        }

        let t = Instant::now();
        let found = self.memory.get(&key.exact);
        self.metrics
            .record_tier(CacheTier::Memory, found.is_some(), t.elapsed());
        if let Some(entry) = found {
            self.backfill(key, &entry, false);
            return Some(CacheHit {
                entry,
                tier: CacheTier::Memory,
            });
        }

        let t = Instant::now();
        let mut found = self.distributed_get(&key.distributed).await;
        if found.is_none() && key.pattern.is_some() {
            found = self
                .matcher
                .find_similar(key, &self.keys, self.distributed.as_ref())
                .await;
        }
        self.metrics
            .record_tier(CacheTier::Distributed, found.is_some(), t.elapsed());
        let entry = found?;
        self.backfill(key, &entry, true);
        Some(CacheHit {
            entry,
            tier: CacheTier::Distributed,
        })
    }

    async fn distributed_get(&self, key: &str) -> Option<CacheEntry> {
        let bytes = match self.distributed.get(key).await {
            Ok(Some(b)) => b,
            Ok(None) => return None,
            Err(e) => {
                self.metrics.record_error();
                warn!(backend = self.distributed.name(), error = %e, "distributed cache read failed, treating as miss");
                return None;
            }
        };
        match CacheEntry::from_bytes(&bytes) {
            Ok(entry) if entry.remaining().is_some() => Some(entry),
            Ok(_) => None,
            Err(e) => {
                self.metrics.record_error();
                warn!(backend = self.distributed.name(), error = %e, "undecodable distributed cache entry");
                None
            }
        }
    }

    fn backfill(&self, key: &TieredKey, entry: &CacheEntry, include_memory: bool) {
        let Some(ttl) = entry.remaining() else {
            return;
        };
        if let Some(pattern) = &key.pattern {
            self.pattern.put(pattern, entry.clone(), ttl);
        }
        if include_memory {
            self.memory.put(&key.exact, entry.clone(), ttl);
        }
    }

    /// Writes `response` to every tier with the TTL its content class calls for.
    pub async fn store(&self, request: &ChatRequest, response: &ChatResponse) -> Option<TtlClass> {
        if !self.config.enabled {
            return None;
        }
        let key = self.key_for(request);
        let (class, ttl) = self.config.ttl.ttl(&request.full_text());
        let entry = CacheEntry::new(response.clone(), key.semantic.clone(), class, ttl);
        self.store_entry(&key, entry).await;
        Some(class)
    }

    pub async fn store_entry(&self, key: &TieredKey, entry: CacheEntry) {
        let ttl = entry.ttl();
        if ttl.is_zero() {
            return;
        }
        if let Some(pattern) = &key.pattern {
            self.pattern.put(pattern, entry.clone(), ttl);
        }
        self.memory.put(&key.exact, entry.clone(), ttl);
        self.metrics.record_write();

        if let Err(e) = self.distributed_put(&key.distributed, &entry, ttl).await {
            self.metrics.record_error();
            warn!(backend = self.distributed.name(), error = %e, "distributed cache write failed");
        }
    }

    async fn distributed_put(&self, key: &str, entry: &CacheEntry, ttl: Duration) -> Result<()> {
        let mut bytes = entry.to_bytes()?;
        if bytes.len() > self.config.max_entry_bytes {
            let truncated = entry.truncated_to(self.config.max_entry_bytes)?;
            debug!(
                original_bytes = bytes.len(),
                ceiling = self.config.max_entry_bytes,
                "truncating oversized entry for distributed tier"
            );
            bytes = truncated.to_bytes()?;
        }
        self.distributed.set(key, &bytes, ttl.as_secs()).await
    }

    /// Exact-key delete on the pattern and memory tiers. The distributed tier only
    /// supports bulk [`clear`](Self::clear).
    pub fn invalidate(&self, request: &ChatRequest) -> bool {
        let key = self.key_for(request);
        self.invalidate_key(&key)
    }

    pub fn invalidate_key(&self, key: &TieredKey) -> bool {
        let a = key
            .pattern
            .as_ref()
            .map_or(false, |pattern| self.pattern.remove(pattern));
        let b = self.memory.remove(&key.exact);
        a || b
    }

    /// Empties every tier.
    pub async fn clear(&self) -> Result<()> {
        self.pattern.clear();
        self.memory.clear();
        self.distributed.flush_all().await
    }

    pub fn record_cost_avoided(&self, usd: f64) {
        self.metrics.record_cost_avoided(usd);
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::InMemoryBackend;
    use crate::cache::entry::TRUNCATION_MARKER;
    use crate::Error;

    fn response(text: &str) -> ChatResponse {
        let mut r = ChatResponse::new("id", text);
        r.provider = "openai".into();
        r.model = "gpt-4o".into();
        r
    }

    fn hierarchy(backend: Arc<dyn DistributedCacheBackend>) -> CacheHierarchy {
        CacheHierarchy::new(CacheConfig::new().with_namespace("t")).with_backend(backend)
    }

    #[tokio::test]
    async fn test_store_then_pattern_hit() {
        let h = hierarchy(Arc::new(InMemoryBackend::default()));
        let req = ChatRequest::user("Explain ownership");
        assert!(h.lookup(&req).await.is_none());
        h.store(&req, &response("answer")).await;

        let hit = h.lookup(&req).await.unwrap();
        assert_eq!(hit.tier, CacheTier::Pattern);
        assert_eq!(hit.entry.response.content, "answer");

        let stats = h.stats();
        assert_eq!(stats.lookups, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.writes, 1);
    }

    #[tokio::test]
    async fn test_wording_variant_hits_pattern_tier() {
        let h = hierarchy(Arc::new(InMemoryBackend::default()));
        h.store(&ChatRequest::user("Explain ownership"), &response("answer"))
            .await;
        let hit = h
            .lookup(&ChatRequest::user("Please, explain ownership!"))
            .await
            .unwrap();
        assert_eq!(hit.tier, CacheTier::Pattern);
    }

    #[tokio::test]
    async fn test_distributed_hit_backfills_upper_tiers() {
        let backend = Arc::new(InMemoryBackend::default());
        let writer = hierarchy(backend.clone());
        let req = ChatRequest::user("Explain lifetimes");
        writer.store(&req, &response("shared")).await;

        // A second process sharing the backend.
        let reader = hierarchy(backend);
        let hit = reader.lookup(&req).await.unwrap();
        assert_eq!(hit.tier, CacheTier::Distributed);
        let hit = reader.lookup(&req).await.unwrap();
        assert_eq!(hit.tier, CacheTier::Pattern);

        reader.invalidate(&req);
        // Pattern dropped; memory was backfilled too and is dropped as well.
        let hit = reader.lookup(&req).await.unwrap();
        assert_eq!(hit.tier, CacheTier::Distributed);
    }

    #[tokio::test]
    async fn test_invalidate_falls_through_to_memory() {
        let h = hierarchy(Arc::new(NullBackend));
        let req = ChatRequest::user("Explain traits");
        h.store(&req, &response("a")).await;
        let key = h.key_for(&req);
        assert!(h.pattern.remove(key.pattern.as_deref().unwrap()));
        assert_eq!(h.lookup(&req).await.unwrap().tier, CacheTier::Memory);
        assert!(h.invalidate(&req));
        assert!(h.lookup(&req).await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_entries_truncated_only_in_distributed_tier() {
        let backend = Arc::new(InMemoryBackend::default());
        let h = CacheHierarchy::new(CacheConfig::new().with_max_entry_bytes(1_024))
            .with_backend(backend.clone());
        let req = ChatRequest::user("Explain closures");
        let long = "x".repeat(10_000);
        h.store(&req, &response(&long)).await;

        let local = h.lookup(&req).await.unwrap();
        assert_eq!(local.entry.response.content.len(), 10_000);
        assert!(!local.entry.truncated);

        let key = h.key_for(&req);
        let bytes = backend.get(&key.distributed).await.unwrap().unwrap();
        assert!(bytes.len() <= 1_024);
        let remote = CacheEntry::from_bytes(&bytes).unwrap();
        assert!(remote.truncated);
        assert!(remote.response.content.ends_with(TRUNCATION_MARKER));
    }

    struct Failing;

    #[async_trait]
    impl DistributedCacheBackend for Failing {
        async fn get(&self, _: &str) -> Result<Option<Vec<u8>>> {
            Err(Error::network("connection refused"))
        }
        async fn set(&self, _: &str, _: &[u8], _: u64) -> Result<()> {
            Err(Error::network("connection refused"))
        }
        async fn del(&self, _: &[String]) -> Result<u64> {
            Err(Error::network("connection refused"))
        }
        async fn exists(&self, _: &str) -> Result<bool> {
            Err(Error::network("connection refused"))
        }
        async fn flush_all(&self) -> Result<()> {
            Err(Error::network("connection refused"))
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_backend_errors_are_absorbed() {
        let h = hierarchy(Arc::new(Failing));
        let req = ChatRequest::user("Explain async");
        assert!(h.lookup(&req).await.is_none());
        h.store(&req, &response("a")).await;
        assert!(h.lookup(&req).await.is_some());
        assert_eq!(h.stats().errors, 2);
    }

    #[tokio::test]
    async fn test_semantic_prefix_matcher() {
        let backend = Arc::new(InMemoryBackend::default());
        let writer = hierarchy(backend.clone());
        writer
            .store(&ChatRequest::user("Explain monads"), &response("m"))
            .await;

        let plain = hierarchy(backend.clone());
        let variant = ChatRequest::user("explain monads?");
        assert!(plain.lookup(&variant).await.is_none());

        let similar = hierarchy(backend).with_matcher(Arc::new(SemanticPrefixMatcher));
        let hit = similar.lookup(&variant).await.unwrap();
        assert_eq!(hit.tier, CacheTier::Distributed);
        assert_eq!(hit.entry.response.content, "m");
    }

    #[tokio::test]
    async fn test_disabled_cache() {
        let h = CacheHierarchy::new(CacheConfig::new().with_enabled(false));
        let req = ChatRequest::user("hi");
        assert!(h.store(&req, &response("a")).await.is_none());
        assert!(h.lookup(&req).await.is_none());
    }
}
