//! Content-driven TTL classes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

static DOCUMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(document|pdf|contract|manuscript|whitepaper|chapter|transcript)s?\b").unwrap()
});
static TEMPLATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(review|summary|summari[sz]e|analy[sz]e|analysis|overview)\b").unwrap()
});
static USER_SPECIFIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(my|mine|personal|personally)\b").unwrap());
static DYNAMIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(current|currently|latest|now|today|tonight)\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlClass {
    Document,
    Template,
    UserSpecific,
    Dynamic,
    Default,
}

impl TtlClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtlClass::Document => "document",
            TtlClass::Template => "template",
            TtlClass::UserSpecific => "user_specific",
            TtlClass::Dynamic => "dynamic",
            TtlClass::Default => "default",
        }
    }
}

/// TTL per class plus the size above which any content counts as a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlPolicy {
    pub document_secs: u64,
    pub template_secs: u64,
    pub user_specific_secs: u64,
    pub dynamic_secs: u64,
    pub default_secs: u64,
    pub document_threshold_chars: usize,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            document_secs: 24 * 3600,
            template_secs: 6 * 3600,
            user_specific_secs: 30 * 60,
            dynamic_secs: 5 * 60,
            default_secs: 3600,
            document_threshold_chars: 10_000,
        }
    }
}

impl TtlPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, class: TtlClass, ttl: Duration) -> Self {
        let secs = ttl.as_secs();
        match class {
            TtlClass::Document => self.document_secs = secs,
            TtlClass::Template => self.template_secs = secs,
            TtlClass::UserSpecific => self.user_specific_secs = secs,
            TtlClass::Dynamic => self.dynamic_secs = secs,
            TtlClass::Default => self.default_secs = secs,
        }
        self
    }

    pub fn with_document_threshold(mut self, chars: usize) -> Self {
        self.document_threshold_chars = chars;
        self
    }

    /// First matching rule wins: document-like or large, then review/summary/analysis,
    /// then personal, then time-sensitive.
    pub fn classify(&self, text: &str) -> TtlClass {
        if text.chars().count() >= self.document_threshold_chars || DOCUMENT.is_match(text) {
            TtlClass::Document
        } else if TEMPLATE.is_match(text) {
            TtlClass::Template
        } else if USER_SPECIFIC.is_match(text) {
            TtlClass::UserSpecific
        } else if DYNAMIC.is_match(text) {
            TtlClass::Dynamic
        } else {
            TtlClass::Default
        }
    }

    pub fn ttl_for(&self, class: TtlClass) -> Duration {
        Duration::from_secs(match class {
            TtlClass::Document => self.document_secs,
            TtlClass::Template => self.template_secs,
            TtlClass::UserSpecific => self.user_specific_secs,
            TtlClass::Dynamic => self.dynamic_secs,
            TtlClass::Default => self.default_secs,
        })
    }

    pub fn ttl(&self, text: &str) -> (TtlClass, Duration) {
        let class = self.classify(text);
        (class, self.ttl_for(class))
    }
}
