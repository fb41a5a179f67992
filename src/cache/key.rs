//! Cache key generation.
//!
//! Three keys are derived per request, one per tier:
//! - `pattern`: hash of the normalized, stemmed prompt plus the request's scope; absent
//!   when normalization leaves nothing, e.g. a bare greeting or an emoji
//! - `exact`: SHA-256 over the canonical JSON of the full request
//! - `distributed`: `namespace:semantic_key:exact_prefix`

use crate::types::{ChatRequest, MessageRole};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Length of the content-hash prefix embedded in distributed keys.
pub const DISTRIBUTED_HASH_PREFIX: usize = 16;

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static FILLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(please|kindly|could you|can you|would you|will you|i want you to|i would like you to|i would like|i need you to|help me|thank you|thanks|hey|hi|hello|just|basically)\b",
    )
    .unwrap()
});

const SUFFIXES: [&str; 7] = ["ingly", "edly", "ing", "ed", "ly", "es", "s"];

/// Keys for one request across all tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TieredKey {
    pub pattern: Option<String>,
    pub exact: String,
    pub distributed: String,
    pub semantic: String,
}

pub(crate) fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Crude suffix stripping; keeps at least three characters of the stem.
pub fn stem(word: &str) -> &str {
    for suffix in SUFFIXES {
        if word.len() >= suffix.len() + 3 && word.ends_with(suffix) {
            return &word[..word.len() - suffix.len()];
        }
    }
    word
}

/// Lowercases, strips punctuation and filler phrases, stems each word and collapses
/// whitespace.
pub fn normalize_prompt(text: &str) -> String {
    let lower = text.to_lowercase();
    let no_punct = PUNCTUATION.replace_all(&lower, " ");
    let no_filler = FILLER.replace_all(&no_punct, " ");
    let collapsed = WHITESPACE.replace_all(no_filler.trim(), " ");
    collapsed
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(stem)
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct CacheKeyGenerator {
    namespace: String,
}

impl CacheKeyGenerator {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Exact identity: everything except caller metadata.
    pub fn content_hash(request: &ChatRequest) -> String {
        let mut parts: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
        parts.insert("messages", serde_json::to_value(request.messages()).unwrap_or_default());
        parts.insert("params", serde_json::to_value(request.params()).unwrap_or_default());
        parts.insert("strategy", serde_json::to_value(request.strategy()).unwrap_or_default());
        parts.insert(
            "requirements",
            serde_json::to_value(request.requirements()).unwrap_or_default(),
        );
        parts.insert(
            "constraints",
            serde_json::to_value(request.constraints()).unwrap_or_default(),
        );
        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        sha256_hex(canonical.as_bytes())
    }

    /// Everything that changes the answer apart from the user's wording: system and
    /// assistant turns (the "style"), generation params, strategy and selection inputs.
    fn scope(request: &ChatRequest) -> String {
        let context: Vec<(&str, &str)> = request
            .messages()
            .iter()
            .filter(|m| m.role != MessageRole::User)
            .map(|m| (m.role.as_str(), m.content.as_str()))
            .collect();
        let mut parts: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
        parts.insert("context", serde_json::to_value(context).unwrap_or_default());
        parts.insert("params", serde_json::to_value(request.params()).unwrap_or_default());
        parts.insert("strategy", serde_json::to_value(request.strategy()).unwrap_or_default());
        parts.insert(
            "requirements",
            serde_json::to_value(request.requirements()).unwrap_or_default(),
        );
        parts.insert(
            "constraints",
            serde_json::to_value(request.constraints()).unwrap_or_default(),
        );
        serde_json::to_string(&parts).unwrap_or_default()
    }

    /// Falls back to the verbatim prompt when normalization strips it to nothing, so
    /// unrelated filler-only prompts never share a key.
    pub fn semantic_key(request: &ChatRequest) -> String {
        let prompt = request.prompt_text();
        let normalized = normalize_prompt(&prompt);
        let mut material = if normalized.is_empty() {
            let mut raw = b"raw:".to_vec();
            raw.extend_from_slice(prompt.as_bytes());
            raw
        } else {
            normalized.into_bytes()
        };
        material.push(0x1f);
        material.extend_from_slice(Self::scope(request).as_bytes());
        sha256_hex(&material)[..32].to_string()
    }

    pub fn generate(&self, request: &ChatRequest) -> TieredKey {
        let exact = Self::content_hash(request);
        let semantic = Self::semantic_key(request);
        let pattern = if normalize_prompt(&request.prompt_text()).is_empty() {
            None
        } else {
            Some(format!("pattern:{}", semantic))
        };
        TieredKey {
            pattern,
            distributed: format!(
                "{}:{}:{}",
                self.namespace,
                semantic,
                &exact[..DISTRIBUTED_HASH_PREFIX]
            ),
            exact,
            semantic,
        }
    }

    /// Distributed-tier prefix shared by every request with the same semantic key.
    pub fn semantic_prefix(&self, semantic: &str) -> String {
        format!("{}:{}:", self.namespace, semantic)
    }
}

impl Default for CacheKeyGenerator {
    fn default() -> Self {
        Self::new("ai-cache")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyKind;
    use crate::types::Message;

    fn req(prompt: &str) -> ChatRequest {
        ChatRequest::user(prompt)
    }

    #[test]
    fn test_normalize_prompt() {
        assert_eq!(
            normalize_prompt("Could you PLEASE summarize the attached reports?!"),
            "summarize the attach report"
        );
        assert_eq!(normalize_prompt("  Hello,   world  "), "world");
    }

    #[test]
    fn test_stem_keeps_short_words() {
        assert_eq!(stem("is"), "is");
        assert_eq!(stem("running"), "runn");
        assert_eq!(stem("reports"), "report");
        assert_eq!(stem("bus"), "bus");
    }

    #[test]
    fn test_wording_variants_share_semantic_key_not_exact() {
        let a = req("Please explain monads.");
        let b = req("explain monads");
        assert_eq!(
            CacheKeyGenerator::semantic_key(&a),
            CacheKeyGenerator::semantic_key(&b)
        );
        assert_ne!(
            CacheKeyGenerator::content_hash(&a),
            CacheKeyGenerator::content_hash(&b)
        );
    }

    #[test]
    fn test_metadata_does_not_change_identity() {
        let a = ChatRequest::builder()
            .message(Message::user("hi"))
            .metadata("trace", serde_json::json!("abc"))
            .build()
            .unwrap();
        let b = req("hi");
        assert_eq!(
            CacheKeyGenerator::content_hash(&a),
            CacheKeyGenerator::content_hash(&b)
        );
    }

    #[test]
    fn test_scope_separates_semantic_keys() {
        let a = req("explain monads");
        let b = ChatRequest::builder()
            .message(Message::user("explain monads"))
            .strategy(StrategyKind::Performance)
            .build()
            .unwrap();
        let c = ChatRequest::builder()
            .message(Message::system("answer in French"))
            .message(Message::user("explain monads"))
            .build()
            .unwrap();
        let ka = CacheKeyGenerator::semantic_key(&a);
        assert_ne!(ka, CacheKeyGenerator::semantic_key(&b));
        assert_ne!(ka, CacheKeyGenerator::semantic_key(&c));
    }

    #[test]
    fn test_distributed_key_layout() {
        let gen = CacheKeyGenerator::new("ns");
        let key = gen.generate(&req("hi there"));
        assert!(key.distributed.starts_with(&gen.semantic_prefix(&key.semantic)));
        assert!(key.distributed.ends_with(&key.exact[..DISTRIBUTED_HASH_PREFIX]));
        assert_eq!(key.exact.len(), 64);
        assert_eq!(key.pattern, Some(format!("pattern:{}", key.semantic)));
    }

    #[test]
    fn test_filler_only_prompts_have_no_pattern_key() {
        assert_eq!(normalize_prompt("Thanks!"), "");
        let gen = CacheKeyGenerator::default();
        let hi = gen.generate(&req("Hi"));
        let thanks = gen.generate(&req("Thanks!"));
        assert!(hi.pattern.is_none());
        assert!(thanks.pattern.is_none());
        assert_ne!(hi.semantic, thanks.semantic);
        assert_ne!(
            gen.generate(&req("\u{1F44D}")).semantic,
            gen.generate(&req("?!")).semantic
        );
        assert_eq!(hi.semantic, gen.generate(&req("Hi")).semantic);
    }
}
