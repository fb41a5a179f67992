//! Confidence scoring for served responses.

use super::result::ConfidenceSummary;
use crate::provider::ProviderDescriptor;
use crate::tokens::CostEstimate;
use crate::types::{ChatRequest, ChatResponse};
use std::time::Duration;

/// Everything a scorer may look at for one served response.
pub struct ConfidenceInput<'a> {
    pub request: &'a ChatRequest,
    pub response: &'a ChatResponse,
    pub descriptor: &'a ProviderDescriptor,
    pub cost: &'a CostEstimate,
    pub elapsed: Duration,
    pub fallback_used: bool,
}

pub trait ConfidenceScorer: Send + Sync {
    fn score(&self, input: &ConfidenceInput<'_>) -> ConfidenceSummary;
}

/// Single-provider heuristic. Provider agreement is a fixed prior since only one provider
/// answers; the other sub-scores come from the descriptor and the observed call.
#[derive(Debug, Clone)]
pub struct HeuristicConfidenceScorer {
    pub agreement_prior: f64,
    /// Multiplied into agreement when a fallback served the request.
    pub fallback_penalty: f64,
    /// Spend (USD) at which cost efficiency reaches 0.5.
    pub reference_cost: f64,
}

impl Default for HeuristicConfidenceScorer {
    fn default() -> Self {
        Self {
            agreement_prior: 0.85,
            fallback_penalty: 0.9,
            reference_cost: 0.01,
        }
    }
}

impl ConfidenceScorer for HeuristicConfidenceScorer {
    fn score(&self, input: &ConfidenceInput<'_>) -> ConfidenceSummary {
        let agreement = if input.fallback_used {
            self.agreement_prior * self.fallback_penalty
        } else {
            self.agreement_prior
        };
        let cost_efficiency = if self.reference_cost > 0.0 {
            self.reference_cost / (self.reference_cost + input.cost.total_cost.max(0.0))
        } else {
            1.0
        };
        let expected_ms = input.descriptor.avg_latency_ms.max(1) as f64;
        let actual_ms = input.elapsed.as_secs_f64() * 1000.0;
        let latency = if actual_ms <= expected_ms {
            1.0
        } else {
            expected_ms / actual_ms
        };
        let mut quality = input.descriptor.quality_score / 100.0;
        if input.response.content.trim().is_empty() && input.response.tool_calls.is_empty() {
            quality *= 0.5;
        }
        ConfidenceSummary::from_parts(agreement, cost_efficiency, latency, quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(
        request: &'a ChatRequest,
        response: &'a ChatResponse,
        descriptor: &'a ProviderDescriptor,
        cost: &'a CostEstimate,
        elapsed_ms: u64,
        fallback_used: bool,
    ) -> ConfidenceInput<'a> {
        ConfidenceInput {
            request,
            response,
            descriptor,
            cost,
            elapsed: Duration::from_millis(elapsed_ms),
            fallback_used,
        }
    }

    #[test]
    fn test_heuristic_sub_scores() {
        let req = ChatRequest::user("hi");
        let resp = ChatResponse::new("id", "hello");
        let d = ProviderDescriptor::new("p", "m")
            .with_latency_ms(1_000)
            .with_quality(80.0);
        let cost = CostEstimate {
            total_cost: 0.01,
            ..Default::default()
        };
        let scorer = HeuristicConfidenceScorer::default();

        let fast = scorer.score(&input(&req, &resp, &d, &cost, 500, false));
        assert!((fast.provider_agreement - 0.85).abs() < 1e-9);
        assert!((fast.cost_efficiency - 0.5).abs() < 1e-9);
        assert_eq!(fast.latency, 1.0);
        assert!((fast.quality - 0.8).abs() < 1e-9);

        let slow = scorer.score(&input(&req, &resp, &d, &cost, 2_000, true));
        assert!((slow.latency - 0.5).abs() < 1e-9);
        assert!(slow.provider_agreement < fast.provider_agreement);
        assert!(slow.overall < fast.overall);
    }

    #[test]
    fn test_empty_answer_lowers_quality() {
        let req = ChatRequest::user("hi");
        let resp = ChatResponse::new("id", "  ");
        let d = ProviderDescriptor::new("p", "m").with_quality(80.0);
        let cost = CostEstimate::default();
        let s = HeuristicConfidenceScorer::default().score(&input(&req, &resp, &d, &cost, 1, false));
        assert!((s.quality - 0.4).abs() < 1e-9);
        assert_eq!(s.cost_efficiency, 1.0);
    }
}
