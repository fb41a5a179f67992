//! Document and code-review caches.
//!
//! Same pattern → memory → distributed layout as [`CacheHierarchy`](super::CacheHierarchy),
//! but keyed by the raw input and the processing configuration instead of a chat request.

use super::backend::{DistributedCacheBackend, NullBackend};
use super::entry::CacheEntry;
use super::key::{normalize_prompt, sha256_hex};
use super::memory::MemoryTier;
use super::metrics::{CacheMetrics, CacheStats, CacheTier};
use super::ttl::TtlClass;
use crate::types::ChatResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecializedKind {
    Document,
    CodeReview,
}

impl SpecializedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecializedKind::Document => "document",
            SpecializedKind::CodeReview => "code_review",
        }
    }

    fn ttl_class(&self) -> TtlClass {
        match self {
            SpecializedKind::Document => TtlClass::Document,
            SpecializedKind::CodeReview => TtlClass::Template,
        }
    }
}

/// What was done to the input: the model plus a summary style or review type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub model: String,
    pub variant: String,
}

impl ProcessingConfig {
    pub fn new(model: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            variant: variant.into(),
        }
    }

    fn hash(&self) -> String {
        let material = format!("{}\u{1f}{}", self.model, self.variant);
        sha256_hex(material.as_bytes())[..16].to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecializedCacheConfig {
    pub namespace: String,
    pub capacity: usize,
    /// Inputs larger than this are never cached.
    pub max_input_bytes: usize,
    pub ttl_secs: u64,
}

impl SpecializedCacheConfig {
    pub fn for_kind(kind: SpecializedKind) -> Self {
        let ttl_secs = match kind {
            SpecializedKind::Document => 24 * 3600,
            SpecializedKind::CodeReview => 6 * 3600,
        };
        Self {
            namespace: "ai-cache".into(),
            capacity: 500,
            max_input_bytes: 2 * 1024 * 1024,
            ttl_secs,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_max_input_bytes(mut self, bytes: usize) -> Self {
        self.max_input_bytes = bytes;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }
}

impl Default for SpecializedCacheConfig {
    fn default() -> Self {
        Self::for_kind(SpecializedKind::Document)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SpecializedKey {
    pattern: Option<String>,
    exact: String,
    distributed: String,
}

pub struct SpecializedCache {
    kind: SpecializedKind,
    config: SpecializedCacheConfig,
    pattern: MemoryTier,
    memory: MemoryTier,
    distributed: Arc<dyn DistributedCacheBackend>,
    metrics: CacheMetrics,
}

impl SpecializedCache {
    pub fn new(kind: SpecializedKind, config: SpecializedCacheConfig) -> Self {
        Self {
            kind,
            pattern: MemoryTier::new(config.capacity),
            memory: MemoryTier::new(config.capacity),
            distributed: Arc::new(NullBackend),
            metrics: CacheMetrics::default(),
            config,
        }
    }

    pub fn documents() -> Self {
        Self::new(
            SpecializedKind::Document,
            SpecializedCacheConfig::for_kind(SpecializedKind::Document),
        )
    }

    pub fn code_reviews() -> Self {
        Self::new(
            SpecializedKind::CodeReview,
            SpecializedCacheConfig::for_kind(SpecializedKind::CodeReview),
        )
    }

    pub fn with_backend(mut self, backend: Arc<dyn DistributedCacheBackend>) -> Self {
        self.distributed = backend;
        self
    }

    pub fn kind(&self) -> SpecializedKind {
        self.kind
    }

    pub fn is_cacheable(&self, input: &str) -> bool {
        input.len() <= self.config.max_input_bytes
    }

    fn key(&self, input: &str, processing: &ProcessingConfig, user: Option<&str>) -> SpecializedKey {
        let config_hash = processing.hash();
        let scope = user.map(|u| format!(":u:{}", u)).unwrap_or_default();
        let normalized = normalize_prompt(input);
        let pattern = (!normalized.is_empty()).then(|| {
            let digest = sha256_hex(normalized.as_bytes());
            format!("{}:pattern:{}:{}{}", self.kind.as_str(), &digest[..32], config_hash, scope)
        });
        let exact = format!("{}:{}{}", sha256_hex(input.as_bytes()), config_hash, scope);
        SpecializedKey {
            pattern,
            distributed: format!("{}:{}:{}", self.config.namespace, self.kind.as_str(), exact),
            exact,
        }
    }

    pub async fn get(
        &self,
        input: &str,
        processing: &ProcessingConfig,
        user: Option<&str>,
    ) -> Option<ChatResponse> {
        if !self.is_cacheable(input) {
            return None;
        }
        let started = Instant::now();
        let key = self.key(input, processing, user);
        let hit = self.find(&key).await;
        self.metrics.record_lookup(hit.is_some(), started.elapsed());
        debug!(kind = self.kind.as_str(), hit = hit.is_some(), "specialized cache lookup");
        hit
    }

    async fn find(&self, key: &SpecializedKey) -> Option<ChatResponse> {
        if let Some(pattern) = &key.pattern {
            let t = Instant::now();
            let found = self.pattern.get(pattern);
            self.metrics
                .record_tier(CacheTier::Pattern, found.is_some(), t.elapsed());
            if let Some(entry) = found {
                return Some(entry.response);
            }
        }

        let t = Instant::now();
        let found = self.memory.get(&key.exact);
        self.metrics
            .record_tier(CacheTier::Memory, found.is_some(), t.elapsed());
        if let Some(entry) = found {
            if let Some(ttl) = entry.remaining() {
                self.put_pattern(key, &entry, ttl);
            }
            return Some(entry.response);
        }

        let t = Instant::now();
        let found = match self.distributed.get(&key.distributed).await {
            Ok(Some(bytes)) => CacheEntry::from_bytes(&bytes)
                .ok()
                .filter(|e| e.remaining().is_some()),
            Ok(None) => None,
            Err(e) => {
                self.metrics.record_error();
                warn!(kind = self.kind.as_str(), error = %e, "distributed read failed, treating as miss");
                None
            }
        };
        self.metrics
            .record_tier(CacheTier::Distributed, found.is_some(), t.elapsed());
        let entry = found?;
        if let Some(ttl) = entry.remaining() {
            self.put_pattern(key, &entry, ttl);
            self.memory.put(&key.exact, entry.clone(), ttl);
        }
        Some(entry.response)
    }

    fn put_pattern(&self, key: &SpecializedKey, entry: &CacheEntry, ttl: Duration) {
        if let Some(pattern) = &key.pattern {
            self.pattern.put(pattern, entry.clone(), ttl);
        }
    }

    /// Returns `false` when the input is over the size ceiling and nothing was stored.
    pub async fn put(
        &self,
        input: &str,
        processing: &ProcessingConfig,
        user: Option<&str>,
        response: &ChatResponse,
    ) -> bool {
        if !self.is_cacheable(input) {
            debug!(kind = self.kind.as_str(), bytes = input.len(), "input over size ceiling, not cached");
            return false;
        }
        let key = self.key(input, processing, user);
        let ttl = Duration::from_secs(self.config.ttl_secs);
        let entry = CacheEntry::new(response.clone(), key.exact.clone(), self.kind.ttl_class(), ttl);
        self.put_pattern(&key, &entry, ttl);
        self.memory.put(&key.exact, entry.clone(), ttl);
        self.metrics.record_write();

        let written = match entry.to_bytes() {
            Ok(bytes) => self.distributed.set(&key.distributed, &bytes, ttl.as_secs()).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            self.metrics.record_error();
            warn!(kind = self.kind.as_str(), error = %e, "distributed write failed");
        }
        true
    }

    pub fn invalidate(&self, input: &str, processing: &ProcessingConfig, user: Option<&str>) -> bool {
        let key = self.key(input, processing, user);
        let a = key
            .pattern
            .as_ref()
            .map_or(false, |pattern| self.pattern.remove(pattern));
        let b = self.memory.remove(&key.exact);
        a || b
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::InMemoryBackend;

    fn summary(text: &str) -> ChatResponse {
        ChatResponse::new("id", text)
    }

    #[tokio::test]
    async fn test_processing_config_partitions_entries() {
        let cache = SpecializedCache::documents();
        let brief = ProcessingConfig::new("gpt-4o", "brief");
        let detailed = ProcessingConfig::new("gpt-4o", "detailed");
        cache.put("The quarterly report.", &brief, None, &summary("short")).await;

        assert_eq!(
            cache.get("The quarterly report.", &brief, None).await.unwrap().content,
            "short"
        );
        assert!(cache.get("The quarterly report.", &detailed, None).await.is_none());
        let other_model = ProcessingConfig::new("claude-3-5-sonnet-latest", "brief");
        assert!(cache.get("The quarterly report.", &other_model, None).await.is_none());
    }

    #[tokio::test]
    async fn test_user_scope_isolates_entries() {
        let cache = SpecializedCache::code_reviews();
        let cfg = ProcessingConfig::new("gpt-4o", "security");
        cache
            .put("fn main() {}", &cfg, Some("alice"), &summary("lgtm"))
            .await;
        assert!(cache.get("fn main() {}", &cfg, Some("alice")).await.is_some());
        assert!(cache.get("fn main() {}", &cfg, Some("bob")).await.is_none());
        assert!(cache.get("fn main() {}", &cfg, None).await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_input_bypasses_cache() {
        let cache = SpecializedCache::new(
            SpecializedKind::Document,
            SpecializedCacheConfig::for_kind(SpecializedKind::Document).with_max_input_bytes(16),
        );
        let cfg = ProcessingConfig::new("m", "brief");
        let big = "a".repeat(17);
        assert!(!cache.put(&big, &cfg, None, &summary("x")).await);
        assert!(cache.get(&big, &cfg, None).await.is_none());
        assert_eq!(cache.stats().lookups, 0);
        assert_eq!(cache.stats().writes, 0);
    }

    #[tokio::test]
    async fn test_distributed_tier_shared_and_backfilled() {
        let backend = Arc::new(InMemoryBackend::default());
        let cfg = ProcessingConfig::new("m", "style");
        let writer = SpecializedCache::documents().with_backend(backend.clone());
        writer.put("contract text", &cfg, None, &summary("s")).await;

        let reader = SpecializedCache::documents().with_backend(backend);
        assert!(reader.get("contract text", &cfg, None).await.is_some());
        assert!(reader.get("contract text", &cfg, None).await.is_some());
        let stats = reader.stats();
        assert_eq!(stats.distributed.hits, 1);
        assert_eq!(stats.pattern.hits, 1);
    }

    #[tokio::test]
    async fn test_filler_only_inputs_use_exact_tiers() {
        let cache = SpecializedCache::documents();
        let cfg = ProcessingConfig::new("m", "brief");
        cache.put("Thanks!", &cfg, None, &summary("you're welcome")).await;

        assert!(cache.get("Hi", &cfg, None).await.is_none());
        assert_eq!(
            cache.get("Thanks!", &cfg, None).await.unwrap().content,
            "you're welcome"
        );
        let stats = cache.stats();
        assert_eq!(stats.pattern.lookups, 0);
        assert_eq!(stats.memory.hits, 1);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = SpecializedCache::documents();
        let cfg = ProcessingConfig::new("m", "style");
        cache.put("doc", &cfg, None, &summary("s")).await;
        assert!(cache.invalidate("doc", &cfg, None));
        assert!(cache.get("doc", &cfg, None).await.is_none());
    }
}
