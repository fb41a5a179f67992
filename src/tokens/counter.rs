//! Token counter implementations.

use crate::types::Message;
use std::sync::Arc;

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// Counts message content plus a fixed per-message framing overhead.
    fn count_messages(&self, messages: &[Message]) -> usize {
        let content: usize = messages.iter().map(|m| self.count(&m.content)).sum();
        content + messages.len() * 4
    }
}

#[derive(Debug, Clone)]
pub struct CharacterEstimator {
    chars_per_token: f64,
}

impl CharacterEstimator {
    pub fn new() -> Self {
        Self::with_ratio(4.0)
    }

    pub fn with_ratio(r: f64) -> Self {
        Self { chars_per_token: r }
    }
}

impl Default for CharacterEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for CharacterEstimator {
    fn count(&self, text: &str) -> usize {
        (text.len() as f64 / self.chars_per_token).ceil() as usize
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicEstimator {
    chars_per_token: f64,
}

impl AnthropicEstimator {
    pub fn new() -> Self {
        Self {
            chars_per_token: 3.5,
        }
    }
}

impl Default for AnthropicEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for AnthropicEstimator {
    fn count(&self, text: &str) -> usize {
        let base = (text.len() as f64 / self.chars_per_token).ceil() as usize;
        let ws = text.chars().filter(|c| c.is_whitespace()).count();
        base + (ws as f64 * 0.1) as usize
    }
}

/// Picks an estimator for a provider name.
pub fn counter_for(provider: &str) -> Arc<dyn TokenCounter> {
    if provider.eq_ignore_ascii_case("anthropic") {
        Arc::new(AnthropicEstimator::new())
    } else {
        Arc::new(CharacterEstimator::new())
    }
}
