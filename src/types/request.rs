//! The immutable chat request consumed by the orchestrator.

use crate::strategy::StrategyKind;
use crate::types::capability::{Capability, CapabilitySet, PrivacyTier};
use crate::types::message::{Message, MessageRole};
use crate::types::tool::ToolDefinition;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Optional generation parameters forwarded to the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

/// Capability flags a request asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirements {
    pub reasoning: bool,
    pub vision: bool,
    pub tools: bool,
    pub coding: bool,
    pub creative: bool,
    pub analysis: bool,
}

impl Requirements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reasoning(mut self) -> Self {
        self.reasoning = true;
        self
    }

    pub fn with_vision(mut self) -> Self {
        self.vision = true;
        self
    }

    pub fn with_tools(mut self) -> Self {
        self.tools = true;
        self
    }

    pub fn with_coding(mut self) -> Self {
        self.coding = true;
        self
    }

    pub fn with_creative(mut self) -> Self {
        self.creative = true;
        self
    }

    pub fn with_analysis(mut self) -> Self {
        self.analysis = true;
        self
    }

    pub fn capabilities(&self) -> CapabilitySet {
        let flags = [
            (self.reasoning, Capability::Reasoning),
            (self.vision, Capability::Vision),
            (self.tools, Capability::Tools),
            (self.coding, Capability::Coding),
            (self.creative, Capability::Creative),
            (self.analysis, Capability::Analysis),
        ];
        flags
            .into_iter()
            .filter(|(on, _)| *on)
            .map(|(_, cap)| cap)
            .collect()
    }
}

/// Hard limits and preferences applied while selecting providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    /// Ceiling on the blended cost per 1000 tokens.
    pub max_cost: Option<f64>,
    pub max_latency_ms: Option<u64>,
    /// Minimum provider quality score (0-100).
    pub quality_threshold: Option<f64>,
    pub exclude_providers: Vec<String>,
    pub preferred_providers: Vec<String>,
    pub required_capabilities: Vec<Capability>,
    pub privacy_level: Option<PrivacyTier>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_cost(mut self, cost: f64) -> Self {
        self.max_cost = Some(cost);
        self
    }

    pub fn with_max_latency_ms(mut self, ms: u64) -> Self {
        self.max_latency_ms = Some(ms);
        self
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = Some(threshold);
        self
    }

    pub fn exclude(mut self, provider: impl Into<String>) -> Self {
        self.exclude_providers.push(provider.into());
        self
    }

    pub fn prefer(mut self, provider: impl Into<String>) -> Self {
        self.preferred_providers.push(provider.into());
        self
    }

    pub fn require(mut self, capability: Capability) -> Self {
        self.required_capabilities.push(capability);
        self
    }

    pub fn with_privacy_level(mut self, tier: PrivacyTier) -> Self {
        self.privacy_level = Some(tier);
        self
    }

    pub fn is_excluded(&self, provider: &str) -> bool {
        self.exclude_providers
            .iter()
            .any(|p| p.eq_ignore_ascii_case(provider))
    }

    pub fn is_preferred(&self, provider: &str) -> bool {
        self.preferred_providers
            .iter()
            .any(|p| p.eq_ignore_ascii_case(provider))
    }
}

/// A chat request. Immutable once built; use [`ChatRequest::builder`].
///
/// `metadata` is carried for callers (trace tags, timestamps) and never participates in
/// cache identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    messages: Vec<Message>,
    #[serde(default)]
    params: GenerationParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    strategy: Option<StrategyKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    requirements: Option<Requirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    constraints: Option<Constraints>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, serde_json::Value>,
}

impl ChatRequest {
    pub fn builder() -> ChatRequestBuilder {
        ChatRequestBuilder::default()
    }

    /// Shorthand for a single user message with default options.
    pub fn user(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            params: GenerationParams::default(),
            strategy: None,
            requirements: None,
            constraints: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn strategy(&self) -> Option<StrategyKind> {
        self.strategy
    }

    pub fn requirements(&self) -> Option<&Requirements> {
        self.requirements.as_ref()
    }

    pub fn constraints(&self) -> Option<&Constraints> {
        self.constraints.as_ref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn word_count(&self) -> usize {
        self.messages.iter().map(Message::word_count).sum()
    }

    /// Concatenated user-authored text.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Concatenated text of every message.
    pub fn full_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Union of the requirement flags, explicitly required capabilities and implied ones.
    pub fn required_capabilities(&self) -> CapabilitySet {
        let mut caps = self
            .requirements
            .map(|r| r.capabilities())
            .unwrap_or_default();
        if let Some(c) = &self.constraints {
            caps.extend(c.required_capabilities.iter().copied());
        }
        if self.params.tools.as_ref().map(|t| !t.is_empty()).unwrap_or(false) {
            caps.insert(Capability::Tools);
        }
        caps
    }

    pub fn privacy_level(&self) -> PrivacyTier {
        self.constraints
            .as_ref()
            .and_then(|c| c.privacy_level)
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct ChatRequestBuilder {
    messages: Vec<Message>,
    params: GenerationParams,
    strategy: Option<StrategyKind>,
    requirements: Option<Requirements>,
    constraints: Option<Constraints>,
    metadata: BTreeMap<String, serde_json::Value>,
}

impl ChatRequestBuilder {
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.params.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.params.max_tokens = Some(max_tokens);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.params.tools = Some(tools);
        self
    }

    pub fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = Some(requirements);
        self
    }

    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn build(self) -> Result<ChatRequest> {
        if self.messages.is_empty() {
            return Err(Error::Validation {
                message: "request must contain at least one message".into(),
                context: ErrorContext::new()
                    .with_source("request_builder")
                    .with_details("field: messages"),
            });
        }
        if let Some(t) = self.params.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(Error::Validation {
                    message: format!("temperature {} is outside [0, 2]", t),
                    context: ErrorContext::new()
                        .with_source("request_builder")
                        .with_details("field: params.temperature"),
                });
            }
        }
        Ok(ChatRequest {
            messages: self.messages,
            params: self.params,
            strategy: self.strategy,
            requirements: self.requirements,
            constraints: self.constraints,
            metadata: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_empty_messages() {
        let err = ChatRequest::builder().build().unwrap_err();
        assert_eq!(err.kind(), crate::error_code::ErrorKind::Validation);
    }

    #[test]
    fn test_builder_rejects_bad_temperature() {
        let err = ChatRequest::builder()
            .message(Message::user("hi"))
            .temperature(3.5)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_required_capabilities_union() {
        let req = ChatRequest::builder()
            .message(Message::user("write a parser"))
            .requirements(Requirements::new().with_coding())
            .constraints(Constraints::new().require(Capability::Reasoning))
            .tools(vec![ToolDefinition::new("search")])
            .build()
            .unwrap();
        let caps = req.required_capabilities();
        assert!(caps.contains(&Capability::Coding));
        assert!(caps.contains(&Capability::Reasoning));
        assert!(caps.contains(&Capability::Tools));
        assert_eq!(caps.len(), 3);
    }

    #[test]
    fn test_prompt_text_only_user_messages() {
        let req = ChatRequest::builder()
            .message(Message::system("be terse"))
            .message(Message::user("first"))
            .message(Message::assistant("ok"))
            .message(Message::user("second"))
            .build()
            .unwrap();
        assert_eq!(req.prompt_text(), "first\nsecond");
        assert_eq!(req.word_count(), 5);
    }
}
