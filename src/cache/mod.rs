//! 响应缓存模块：三级缓存（模式、内存、分布式）以减少重复的提供商调用。
//!
//! # Response Caching Module
//!
//! Every orchestrated request is looked up here before any provider is called.
//!
//! ## Tiers
//!
//! | Tier | Key | Storage |
//! |------|-----|---------|
//! | Pattern | normalized, stemmed prompt + scope | in-process LRU |
//! | Memory | SHA-256 of the full request | in-process LRU |
//! | Distributed | `namespace:semantic:hash_prefix` | [`DistributedCacheBackend`] |
//!
//! The first hit wins and the tiers above it are backfilled. Writes go to every tier;
//! entries over [`CacheConfig::max_entry_bytes`] are truncated for the distributed tier
//! only. TTLs come from a content heuristic, see [`TtlPolicy`].
//!
//! ## Example
//!
//! ```rust
//! use ai_lib_orchestrator::cache::{CacheConfig, CacheHierarchy, InMemoryBackend};
//! use std::sync::Arc;
//!
//! let cache = CacheHierarchy::new(CacheConfig::new().with_namespace("prod"))
//!     .with_backend(Arc::new(InMemoryBackend::default()));
//! assert_eq!(cache.backend_name(), "in_memory");
//! ```

mod backend;
mod entry;
mod hierarchy;
mod key;
mod memory;
mod metrics;
mod specialized;
mod ttl;

pub use backend::{DistributedCacheBackend, InMemoryBackend, NullBackend};
pub use entry::{CacheEntry, TRUNCATION_MARKER};
pub use hierarchy::{
    CacheConfig, CacheHierarchy, CacheHit, NoSimilarity, SemanticPrefixMatcher, SimilarityMatcher,
};
pub use key::{normalize_prompt, stem, CacheKeyGenerator, TieredKey, DISTRIBUTED_HASH_PREFIX};
pub use memory::MemoryTier;
pub use metrics::{CacheStats, CacheTier, TierStats};
pub use specialized::{ProcessingConfig, SpecializedCache, SpecializedCacheConfig, SpecializedKind};
pub use ttl::{TtlClass, TtlPolicy};
