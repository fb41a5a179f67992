//! Strategy tags and request complexity.

use crate::{Error, ErrorContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named scoring policy used to rank candidate providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    CostOptimized,
    Performance,
    PrivacyFirst,
    #[default]
    Balanced,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::CostOptimized,
        StrategyKind::Performance,
        StrategyKind::PrivacyFirst,
        StrategyKind::Balanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::CostOptimized => "cost_optimized",
            StrategyKind::Performance => "performance",
            StrategyKind::PrivacyFirst => "privacy_first",
            StrategyKind::Balanced => "balanced",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Configuration {
                message: format!("unknown strategy '{}'", s),
                context: ErrorContext::new().with_details(
                    "expected one of: cost_optimized, performance, privacy_first, balanced",
                ),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub const MODERATE_WORDS: usize = 100;
    pub const COMPLEX_WORDS: usize = 500;

    pub fn from_word_count(words: usize) -> Self {
        if words < Self::MODERATE_WORDS {
            Complexity::Simple
        } else if words < Self::COMPLEX_WORDS {
            Complexity::Moderate
        } else {
            Complexity::Complex
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
