//! Static provider descriptors and the built-in catalog.

use crate::tokens::ModelPricing;
use crate::types::{Capability, CapabilitySet, PrivacyTier};
use serde::{Deserialize, Serialize};

/// Static facts about one (provider, model) pair used for selection and cost accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub capabilities: CapabilitySet,
    pub pricing: ModelPricing,
    pub avg_latency_ms: u64,
    /// 0-100.
    pub quality_score: f64,
    #[serde(default)]
    pub privacy_tier: PrivacyTier,
}

impl ProviderDescriptor {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            capabilities: [Capability::Chat].into_iter().collect(),
            pricing: ModelPricing::free(),
            avg_latency_ms: 1_000,
            quality_score: 50.0,
            privacy_tier: PrivacyTier::Public,
        }
    }

    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(caps);
        self
    }

    pub fn with_pricing(mut self, input_per_1k: f64, output_per_1k: f64) -> Self {
        self.pricing = ModelPricing::new(input_per_1k, output_per_1k);
        self
    }

    pub fn with_latency_ms(mut self, ms: u64) -> Self {
        self.avg_latency_ms = ms;
        self
    }

    pub fn with_quality(mut self, score: f64) -> Self {
        self.quality_score = score.clamp(0.0, 100.0);
        self
    }

    pub fn with_privacy(mut self, tier: PrivacyTier) -> Self {
        self.privacy_tier = tier;
        self
    }

    pub fn supports(&self, required: &CapabilitySet) -> bool {
        required.is_subset(&self.capabilities)
    }

    pub fn has(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    /// Blended price per 1000 tokens.
    pub fn cost_per_1k(&self) -> f64 {
        self.pricing.blended_per_1k()
    }

    /// Built-in catalog covering every [`super::ProviderKind`].
    pub fn defaults() -> Vec<ProviderDescriptor> {
        use Capability::*;
        let frontier = [Chat, Streaming, Reasoning, Vision, Tools, Coding, Creative, Analysis];
        let compact = [Chat, Streaming, Tools, Coding, Creative, Analysis];

        vec![
            ProviderDescriptor::new("openai", "gpt-4o")
                .with_capabilities(frontier)
                .with_capabilities([ImageGeneration])
                .with_pricing(0.0025, 0.01)
                .with_latency_ms(900)
                .with_quality(92.0)
                .with_privacy(PrivacyTier::Private),
            ProviderDescriptor::new("openai", "gpt-4o-mini")
                .with_capabilities(compact)
                .with_capabilities([Vision, ImageGeneration])
                .with_pricing(0.00015, 0.0006)
                .with_latency_ms(500)
                .with_quality(80.0)
                .with_privacy(PrivacyTier::Private),
            ProviderDescriptor::new("anthropic", "claude-3-5-sonnet-latest")
                .with_capabilities(frontier)
                .with_pricing(0.003, 0.015)
                .with_latency_ms(1_100)
                .with_quality(94.0)
                .with_privacy(PrivacyTier::Private),
            ProviderDescriptor::new("anthropic", "claude-3-5-haiku-latest")
                .with_capabilities(compact)
                .with_pricing(0.0008, 0.004)
                .with_latency_ms(600)
                .with_quality(82.0)
                .with_privacy(PrivacyTier::Private),
            ProviderDescriptor::new("google", "gemini-1.5-pro")
                .with_capabilities(frontier)
                .with_pricing(0.00125, 0.005)
                .with_latency_ms(1_000)
                .with_quality(88.0),
            ProviderDescriptor::new("google", "gemini-1.5-flash")
                .with_capabilities(compact)
                .with_capabilities([Vision])
                .with_pricing(0.000075, 0.0003)
                .with_latency_ms(400)
                .with_quality(76.0),
            ProviderDescriptor::new("mistral", "mistral-large-latest")
                .with_capabilities(compact)
                .with_capabilities([Reasoning])
                .with_pricing(0.002, 0.006)
                .with_latency_ms(800)
                .with_quality(85.0)
                .with_privacy(PrivacyTier::Private),
            ProviderDescriptor::new("groq", "llama-3.1-70b-versatile")
                .with_capabilities(compact)
                .with_pricing(0.00059, 0.00079)
                .with_latency_ms(250)
                .with_quality(79.0),
            ProviderDescriptor::new("ollama", "llama3.1")
                .with_capabilities([Chat, Streaming, Coding, Creative, Analysis])
                .with_latency_ms(1_500)
                .with_quality(70.0)
                .with_privacy(PrivacyTier::Regulated),
        ]
    }

    /// Catalog entry for `(provider, model)`, if any.
    pub fn lookup<'a>(
        catalog: &'a [ProviderDescriptor],
        provider: &str,
        model: &str,
    ) -> Option<&'a ProviderDescriptor> {
        catalog
            .iter()
            .find(|d| d.provider.eq_ignore_ascii_case(provider) && d.model == model)
    }
}
