//! Cached payloads.

use super::ttl::TtlClass;
use crate::types::ChatResponse;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const TRUNCATION_MARKER: &str = "\n[truncated]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub response: ChatResponse,
    /// Unix epoch milliseconds.
    pub cached_at_ms: u64,
    pub ttl_secs: u64,
    pub provider: String,
    pub model: String,
    pub semantic_key: String,
    pub ttl_class: TtlClass,
    #[serde(default)]
    pub truncated: bool,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl CacheEntry {
    pub fn new(
        response: ChatResponse,
        semantic_key: impl Into<String>,
        ttl_class: TtlClass,
        ttl: Duration,
    ) -> Self {
        Self {
            provider: response.provider.clone(),
            model: response.model.clone(),
            response,
            cached_at_ms: now_ms(),
            ttl_secs: ttl.as_secs(),
            semantic_key: semantic_key.into(),
            ttl_class,
            truncated: false,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Time left before expiry as of `now_ms`; `None` once expired.
    pub fn remaining_at(&self, now_ms: u64) -> Option<Duration> {
        let expires_at = self.cached_at_ms.saturating_add(self.ttl_secs.saturating_mul(1000));
        (expires_at > now_ms).then(|| Duration::from_millis(expires_at - now_ms))
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_at(now_ms())
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// A copy whose serialized form fits in `max_bytes`, cutting the response text and
    /// appending [`TRUNCATION_MARKER`]. Returns a clone when it already fits.
    pub fn truncated_to(&self, max_bytes: usize) -> serde_json::Result<Self> {
        let size = self.to_bytes()?.len();
        if size <= max_bytes {
            return Ok(self.clone());
        }
        let overflow = size - max_bytes;
        let content = &self.response.content;
        // JSON escaping can make the encoded text longer than the raw text; cut generously.
        let keep = content
            .len()
            .saturating_sub(overflow + TRUNCATION_MARKER.len() * 2);
        let mut cut = keep;
        while cut > 0 && !content.is_char_boundary(cut) {
            cut -= 1;
        }

        let mut out = self.clone();
        out.response.content = format!("{}{}", &content[..cut], TRUNCATION_MARKER);
        out.truncated = true;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(content: &str) -> CacheEntry {
        let mut resp = ChatResponse::new("id", content);
        resp.provider = "openai".into();
        resp.model = "gpt-4o".into();
        CacheEntry::new(resp, "sem", TtlClass::Default, Duration::from_secs(60))
    }

    #[test]
    fn test_remaining_and_expiry() {
        let e = entry("x");
        assert_eq!(e.remaining_at(e.cached_at_ms), Some(Duration::from_secs(60)));
        assert_eq!(e.remaining_at(e.cached_at_ms + 60_000), None);
        assert_eq!(e.provider, "openai");
    }

    #[test]
    fn test_truncation_fits_ceiling_and_marks() {
        let e = entry(&"é".repeat(5_000));
        let t = e.truncated_to(2_000).unwrap();
        assert!(t.truncated);
        assert!(t.response.content.ends_with(TRUNCATION_MARKER));
        assert!(t.to_bytes().unwrap().len() <= 2_000);
        // The original is untouched.
        assert!(!e.truncated);
    }

    #[test]
    fn test_small_entries_are_not_truncated() {
        let e = entry("short");
        let t = e.truncated_to(10_000).unwrap();
        assert_eq!(t, e);
    }
}
