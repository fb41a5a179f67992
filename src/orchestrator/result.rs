//! Enriched results returned by the orchestrator.

use crate::cache::CacheTier;
use crate::error_code::ErrorKind;
use crate::provider::ChatStream;
use crate::strategy::{Complexity, StrategyKind};
use crate::tokens::CostEstimate;
use crate::types::ChatResponse;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A candidate that was tried and failed before the request was served (or exhausted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAttempt {
    pub provider: String,
    pub model: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl FailedAttempt {
    pub fn new(provider: &str, model: &str, error: &Error) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub elapsed_ms: u64,
    pub total_tokens: u32,
    pub tokens_per_second: f64,
}

impl PerformanceSummary {
    pub fn new(elapsed: Duration, total_tokens: u32) -> Self {
        let secs = elapsed.as_secs_f64();
        Self {
            elapsed_ms: elapsed.as_millis() as u64,
            total_tokens,
            tokens_per_second: if secs > 0.0 {
                total_tokens as f64 / secs
            } else {
                0.0
            },
        }
    }
}

/// Sub-scores in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub provider_agreement: f64,
    pub cost_efficiency: f64,
    pub latency: f64,
    pub quality: f64,
    pub overall: f64,
}

impl ConfidenceSummary {
    /// Builds a summary whose `overall` is the mean of the four sub-scores.
    pub fn from_parts(provider_agreement: f64, cost_efficiency: f64, latency: f64, quality: f64) -> Self {
        let clamp = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        let (a, c, l, q) = (
            clamp(provider_agreement),
            clamp(cost_efficiency),
            clamp(latency),
            clamp(quality),
        );
        Self {
            provider_agreement: a,
            cost_efficiency: c,
            latency: l,
            quality: q,
            overall: (a + c + l + q) / 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    /// Correlation id, also attached to any error surfaced for this request.
    pub request_id: String,
    pub response: ChatResponse,
    /// Serving provider. For cache hits, the provider that originally produced the answer.
    pub provider: String,
    pub model: String,
    /// `None` on cache hits, where no ranking happened.
    pub strategy: Option<StrategyKind>,
    pub complexity: Complexity,
    pub fallback_used: bool,
    pub cache_hit: bool,
    pub cache_tier: Option<CacheTier>,
    pub attempted: Vec<FailedAttempt>,
    /// Spend for this call; zero on cache hits.
    pub cost: CostEstimate,
    pub performance: PerformanceSummary,
    pub confidence: ConfidenceSummary,
}

impl OrchestrationResult {
    pub fn content(&self) -> &str {
        &self.response.content
    }
}

/// A live stream plus the selection outcome that produced it. Streams are never cached.
pub struct OrchestratedStream {
    pub request_id: String,
    pub provider: String,
    pub model: String,
    pub strategy: StrategyKind,
    pub fallback_used: bool,
    pub attempted: Vec<FailedAttempt>,
    pub stream: ChatStream,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_performance_summary() {
        let p = PerformanceSummary::new(Duration::from_millis(500), 100);
        assert_eq!(p.elapsed_ms, 500);
        assert!((p.tokens_per_second - 200.0).abs() < 1e-9);
        assert_eq!(PerformanceSummary::new(Duration::ZERO, 10).tokens_per_second, 0.0);
    }

    #[test]
    fn test_confidence_clamps_and_averages() {
        let c = ConfidenceSummary::from_parts(1.5, 0.5, f64::NAN, 0.5);
        assert_eq!(c.provider_agreement, 1.0);
        assert_eq!(c.latency, 0.0);
        assert!((c.overall - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_failed_attempt_records_kind() {
        let a = FailedAttempt::new("openai", "gpt-4o", &Error::server(503, "down"));
        assert_eq!(a.kind, ErrorKind::ServerError);
        assert_eq!(a.label(), "openai/gpt-4o");
    }
}
