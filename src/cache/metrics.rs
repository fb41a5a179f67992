//! Cache counters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    Pattern,
    Memory,
    Distributed,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Pattern => "pattern",
            CacheTier::Memory => "memory",
            CacheTier::Distributed => "distributed",
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    pub lookups: u64,
    pub hits: u64,
    pub hit_rate: f64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub pattern: TierStats,
    pub memory: TierStats,
    pub distributed: TierStats,
    /// Requests looked up (each counts once regardless of tiers visited).
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub writes: u64,
    pub errors: u64,
    /// Estimated spend avoided by hits, in USD.
    pub cost_avoided: f64,
    /// Mean end-to-end lookup latency.
    pub avg_latency_ms: f64,
}

#[derive(Default)]
struct TierCounters {
    lookups: AtomicU64,
    hits: AtomicU64,
    latency_us: AtomicU64,
}

impl TierCounters {
    fn record(&self, hit: bool, latency: Duration) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    fn to_stats(&self) -> TierStats {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        TierStats {
            lookups,
            hits,
            hit_rate: ratio(hits, lookups),
            avg_latency_ms: avg_ms(self.latency_us.load(Ordering::Relaxed), lookups),
        }
    }
}

fn ratio(n: u64, d: u64) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}

fn avg_ms(total_us: u64, n: u64) -> f64 {
    if n == 0 {
        0.0
    } else {
        total_us as f64 / n as f64 / 1000.0
    }
}

#[derive(Default)]
pub(crate) struct CacheMetrics {
    pattern: TierCounters,
    memory: TierCounters,
    distributed: TierCounters,
    lookups: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
    latency_us: AtomicU64,
    // Micro-dollars, so the counter stays atomic.
    cost_avoided_micros: AtomicU64,
}

impl CacheMetrics {
    fn tier(&self, tier: CacheTier) -> &TierCounters {
        match tier {
            CacheTier::Pattern => &self.pattern,
            CacheTier::Memory => &self.memory,
            CacheTier::Distributed => &self.distributed,
        }
    }

    pub(crate) fn record_tier(&self, tier: CacheTier, hit: bool, latency: Duration) {
        self.tier(tier).record(hit, latency);
    }

    pub(crate) fn record_lookup(&self, hit: bool, latency: Duration) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if !hit {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cost_avoided(&self, usd: f64) {
        if usd.is_finite() && usd > 0.0 {
            self.cost_avoided_micros
                .fetch_add((usd * 1_000_000.0).round() as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let hits = lookups.saturating_sub(misses);
        CacheStats {
            pattern: self.pattern.to_stats(),
            memory: self.memory.to_stats(),
            distributed: self.distributed.to_stats(),
            lookups,
            hits,
            misses,
            hit_rate: ratio(hits, lookups),
            writes: self.writes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cost_avoided: self.cost_avoided_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            avg_latency_ms: avg_ms(self.latency_us.load(Ordering::Relaxed), lookups),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_math() {
        let m = CacheMetrics::default();
        m.record_tier(CacheTier::Pattern, false, Duration::from_micros(100));
        m.record_tier(CacheTier::Memory, true, Duration::from_micros(300));
        m.record_lookup(true, Duration::from_micros(400));
        m.record_tier(CacheTier::Pattern, false, Duration::from_micros(100));
        m.record_tier(CacheTier::Memory, false, Duration::from_micros(100));
        m.record_tier(CacheTier::Distributed, false, Duration::from_micros(1_000));
        m.record_lookup(false, Duration::from_micros(1_200));
        m.record_cost_avoided(0.0025);

        let s = m.snapshot();
        assert_eq!(s.lookups, 2);
        assert_eq!(s.hits, 1);
        assert_eq!(s.misses, 1);
        assert!((s.hit_rate - 0.5).abs() < 1e-9);
        assert_eq!(s.pattern.lookups, 2);
        assert_eq!(s.memory.hits, 1);
        assert!((s.memory.hit_rate - 0.5).abs() < 1e-9);
        assert!((s.avg_latency_ms - 0.8).abs() < 1e-9);
        assert!((s.cost_avoided - 0.0025).abs() < 1e-9);
    }
}
