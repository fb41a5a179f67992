//! Candidate filtering and ranking.

use super::kind::{Complexity, StrategyKind};
use crate::provider::ProviderDescriptor;
use crate::types::{ChatRequest, Constraints, PrivacyTier};
use crate::{Error, ErrorContext, Result};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Flat score bonus for providers on the caller's preferred list.
pub const PREFERRED_BONUS: f64 = 10.0;

/// Weights of the balanced strategy: quality, inverse cost, inverse latency.
const BALANCED_WEIGHTS: (f64, f64, f64) = (0.4, 0.3, 0.3);

// Keeps the inverse-cost score finite for free providers.
const COST_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub descriptor: ProviderDescriptor,
    pub score: f64,
    pub rationale: String,
}

impl RankedCandidate {
    pub fn provider(&self) -> &str {
        &self.descriptor.provider
    }

    pub fn model(&self) -> &str {
        &self.descriptor.model
    }

    /// `provider/model`.
    pub fn label(&self) -> String {
        format!("{}/{}", self.descriptor.provider, self.descriptor.model)
    }
}

/// Ranked candidates for one request. `candidates[0]` is the primary, the rest form the
/// fallback chain in order. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub strategy: StrategyKind,
    pub complexity: Complexity,
    pub candidates: Vec<RankedCandidate>,
}

impl StrategyDecision {
    pub fn primary(&self) -> &RankedCandidate {
        &self.candidates[0]
    }

    pub fn fallbacks(&self) -> &[RankedCandidate] {
        &self.candidates[1..]
    }
}

pub struct StrategyEngine {
    catalog: ArcSwap<Vec<ProviderDescriptor>>,
    default_strategy: StrategyKind,
}

impl StrategyEngine {
    pub fn new(catalog: Vec<ProviderDescriptor>) -> Self {
        Self {
            catalog: ArcSwap::from_pointee(catalog),
            default_strategy: StrategyKind::default(),
        }
    }

    /// Engine over [`ProviderDescriptor::defaults`].
    pub fn with_default_catalog() -> Self {
        Self::new(ProviderDescriptor::defaults())
    }

    /// Strategy used when a request does not name one.
    pub fn with_default_strategy(mut self, strategy: StrategyKind) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn default_strategy(&self) -> StrategyKind {
        self.default_strategy
    }

    pub fn catalog(&self) -> Arc<Vec<ProviderDescriptor>> {
        self.catalog.load_full()
    }

    /// Atomically replaces the catalog; in-flight decisions keep the snapshot they loaded.
    pub fn update_catalog(&self, catalog: Vec<ProviderDescriptor>) {
        debug!(entries = catalog.len(), "provider catalog replaced");
        self.catalog.store(Arc::new(catalog));
    }

    pub fn determine(&self, request: &ChatRequest) -> Result<StrategyDecision> {
        let strategy = request.strategy().unwrap_or(self.default_strategy);
        let complexity = Complexity::from_word_count(request.word_count());
        let catalog = self.catalog.load();
        let constraints = request.constraints().cloned().unwrap_or_default();
        let required = request.required_capabilities();
        let privacy = request.privacy_level();

        let survivors: Vec<&ProviderDescriptor> = catalog
            .iter()
            .filter(|d| !constraints.is_excluded(&d.provider))
            .filter(|d| d.privacy_tier.satisfies(privacy))
            .filter(|d| d.supports(&required))
            .filter(|d| within_ceilings(d, &constraints))
            .filter(|d| {
                constraints
                    .quality_threshold
                    .map(|min| d.quality_score >= min)
                    .unwrap_or(true)
            })
            .collect();

        if survivors.is_empty() {
            return Err(Error::NoSuitableProvider {
                message: format!(
                    "none of {} catalog entries satisfy the request constraints",
                    catalog.len()
                ),
                context: ErrorContext::new()
                    .with_source("strategy_engine")
                    .with_details(describe_filters(&constraints, privacy, &required)),
            });
        }

        let min_cost = survivors
            .iter()
            .map(|d| d.cost_per_1k())
            .fold(f64::INFINITY, f64::min);
        let min_latency = survivors
            .iter()
            .map(|d| d.avg_latency_ms.max(1))
            .min()
            .unwrap_or(1);

        let mut candidates: Vec<RankedCandidate> = survivors
            .into_iter()
            .map(|d| {
                let inv_cost = 100.0 * (min_cost + COST_EPSILON) / (d.cost_per_1k() + COST_EPSILON);
                let inv_latency = 100.0 * min_latency as f64 / d.avg_latency_ms.max(1) as f64;
                let mut score = match strategy {
                    StrategyKind::CostOptimized => inv_cost,
                    StrategyKind::Performance => inv_latency,
                    StrategyKind::PrivacyFirst => privacy_score(d.privacy_tier) + 0.1 * d.quality_score,
                    StrategyKind::Balanced => {
                        let (wq, wc, wl) = BALANCED_WEIGHTS;
                        wq * d.quality_score + wc * inv_cost + wl * inv_latency
                    }
                };
                let preferred = constraints.is_preferred(&d.provider);
                if preferred {
                    score += PREFERRED_BONUS;
                }
                RankedCandidate {
                    rationale: format!(
                        "{}: score {:.1} (quality {:.0}, ${:.6}/1k tokens, {}ms, {}){}",
                        strategy,
                        score,
                        d.quality_score,
                        d.cost_per_1k(),
                        d.avg_latency_ms,
                        d.privacy_tier.as_str(),
                        if preferred { ", preferred" } else { "" }
                    ),
                    descriptor: d.clone(),
                    score,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.descriptor.provider.cmp(&b.descriptor.provider))
                .then_with(|| a.descriptor.model.cmp(&b.descriptor.model))
        });

        debug!(
            strategy = %strategy,
            complexity = %complexity,
            candidates = candidates.len(),
            primary = %candidates[0].label(),
            "strategy determined"
        );

        Ok(StrategyDecision {
            strategy,
            complexity,
            candidates,
        })
    }
}

impl Default for StrategyEngine {
    fn default() -> Self {
        Self::with_default_catalog()
    }
}

fn within_ceilings(d: &ProviderDescriptor, c: &Constraints) -> bool {
    if c.is_preferred(&d.provider) {
        return true;
    }
    let cost_ok = c.max_cost.map(|max| d.cost_per_1k() <= max).unwrap_or(true);
    let latency_ok = c
        .max_latency_ms
        .map(|max| d.avg_latency_ms <= max)
        .unwrap_or(true);
    cost_ok && latency_ok
}

fn privacy_score(tier: PrivacyTier) -> f64 {
    match tier {
        PrivacyTier::Regulated => 100.0,
        PrivacyTier::Private => 60.0,
        PrivacyTier::Public => 20.0,
    }
}

fn describe_filters(
    c: &Constraints,
    privacy: PrivacyTier,
    required: &crate::types::CapabilitySet,
) -> String {
    let mut parts = vec![format!("privacy >= {}", privacy.as_str())];
    if !required.is_empty() {
        let caps: Vec<&str> = required.iter().map(|c| c.as_str()).collect();
        parts.push(format!("capabilities [{}]", caps.join(", ")));
    }
    if !c.exclude_providers.is_empty() {
        parts.push(format!("excluded [{}]", c.exclude_providers.join(", ")));
    }
    if let Some(max) = c.max_cost {
        parts.push(format!("max_cost {}", max));
    }
    if let Some(max) = c.max_latency_ms {
        parts.push(format!("max_latency_ms {}", max));
    }
    if let Some(min) = c.quality_threshold {
        parts.push(format!("quality >= {}", min));
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_code::ErrorKind;
    use crate::types::{Capability, Message, Requirements};

    fn catalog() -> Vec<ProviderDescriptor> {
        vec![
            ProviderDescriptor::new("premium", "big")
                .with_pricing(0.03, 0.06)
                .with_latency_ms(1_200)
                .with_quality(95.0)
                .with_capabilities([Capability::Reasoning]),
            ProviderDescriptor::new("mid", "medium")
                .with_pricing(0.01, 0.03)
                .with_latency_ms(700)
                .with_quality(85.0)
                .with_privacy(PrivacyTier::Private),
            ProviderDescriptor::new("cheap", "small")
                .with_pricing(0.0005, 0.0015)
                .with_latency_ms(400)
                .with_quality(70.0),
            ProviderDescriptor::new("budget", "tiny")
                .with_pricing(0.002, 0.004)
                .with_latency_ms(200)
                .with_quality(65.0)
                .with_privacy(PrivacyTier::Regulated),
        ]
    }

    fn request(strategy: StrategyKind, constraints: Constraints) -> ChatRequest {
        ChatRequest::builder()
            .message(Message::user("Hi"))
            .strategy(strategy)
            .constraints(constraints)
            .build()
            .unwrap()
    }

    fn providers(d: &StrategyDecision) -> Vec<&str> {
        d.candidates.iter().map(|c| c.provider()).collect()
    }

    #[test]
    fn test_cost_ceiling_keeps_affordable_providers_cheapest_first() {
        let engine = StrategyEngine::new(catalog());
        let d = engine
            .determine(&request(
                StrategyKind::CostOptimized,
                Constraints::new().with_max_cost(0.01),
            ))
            .unwrap();
        assert_eq!(providers(&d), vec!["cheap", "budget"]);
        assert_eq!(d.complexity, Complexity::Simple);
        assert!(d.primary().score > d.fallbacks()[0].score);
    }

    #[test]
    fn test_excluded_providers_never_ranked() {
        let engine = StrategyEngine::new(catalog());
        let d = engine
            .determine(&request(StrategyKind::Balanced, Constraints::new().exclude("CHEAP")))
            .unwrap();
        assert!(!providers(&d).contains(&"cheap"));
        assert_eq!(d.candidates.len(), 3);
    }

    #[test]
    fn test_no_survivors_is_an_error() {
        let engine = StrategyEngine::new(catalog());
        let err = engine
            .determine(&request(
                StrategyKind::Balanced,
                Constraints::new().with_quality_threshold(99.0),
            ))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuitableProvider);
    }

    #[test]
    fn test_privacy_filtering() {
        let engine = StrategyEngine::new(catalog());
        let regulated = engine
            .determine(&request(
                StrategyKind::Balanced,
                Constraints::new().with_privacy_level(PrivacyTier::Regulated),
            ))
            .unwrap();
        assert_eq!(providers(&regulated), vec!["budget"]);

        let private = engine
            .determine(&request(
                StrategyKind::Balanced,
                Constraints::new().with_privacy_level(PrivacyTier::Private),
            ))
            .unwrap();
        let mut got = providers(&private);
        got.sort();
        assert_eq!(got, vec!["budget", "mid"]);
    }

    #[test]
    fn test_privacy_first_ordering() {
        let engine = StrategyEngine::new(catalog());
        let d = engine
            .determine(&request(StrategyKind::PrivacyFirst, Constraints::new()))
            .unwrap();
        assert_eq!(providers(&d)[..2], ["budget", "mid"]);
    }

    #[test]
    fn test_performance_prefers_lowest_latency() {
        let engine = StrategyEngine::new(catalog());
        let d = engine
            .determine(&request(StrategyKind::Performance, Constraints::new()))
            .unwrap();
        assert_eq!(providers(&d), vec!["budget", "cheap", "mid", "premium"]);
        assert!((d.primary().score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_preferred_provider_skips_ceilings_and_gets_bonus() {
        let engine = StrategyEngine::new(catalog());
        let d = engine
            .determine(&request(
                StrategyKind::CostOptimized,
                Constraints::new().with_max_cost(0.01).prefer("premium"),
            ))
            .unwrap();
        let premium = d
            .candidates
            .iter()
            .find(|c| c.provider() == "premium")
            .unwrap();
        assert!(premium.rationale.ends_with("preferred"));
        assert!(!providers(&d).contains(&"mid"));
    }

    #[test]
    fn test_required_capabilities() {
        let engine = StrategyEngine::new(catalog());
        let req = ChatRequest::builder()
            .message(Message::user("prove it"))
            .requirements(Requirements::new().with_reasoning())
            .build()
            .unwrap();
        let d = engine.determine(&req).unwrap();
        assert_eq!(providers(&d), vec!["premium"]);
        assert_eq!(d.strategy, StrategyKind::Balanced);
    }

    #[test]
    fn test_default_strategy_and_catalog_swap() {
        let engine =
            StrategyEngine::new(catalog()).with_default_strategy(StrategyKind::Performance);
        let d = engine.determine(&ChatRequest::user("hello")).unwrap();
        assert_eq!(d.strategy, StrategyKind::Performance);

        engine.update_catalog(vec![ProviderDescriptor::new("solo", "one")]);
        let d = engine.determine(&ChatRequest::user("hello")).unwrap();
        assert_eq!(providers(&d), vec!["solo"]);
    }

    #[test]
    fn test_default_catalog_ranks_everything_for_plain_request() {
        let engine = StrategyEngine::default();
        let d = engine.determine(&ChatRequest::user("hi")).unwrap();
        assert_eq!(d.candidates.len(), ProviderDescriptor::defaults().len());
    }
}
