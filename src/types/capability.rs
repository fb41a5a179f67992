//! Capability flags and privacy tiers shared by requests and provider descriptors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A capability a provider declares and a request may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Chat,
    Streaming,
    Reasoning,
    Vision,
    Tools,
    Coding,
    Creative,
    Analysis,
    ImageGeneration,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Chat => "chat",
            Capability::Streaming => "streaming",
            Capability::Reasoning => "reasoning",
            Capability::Vision => "vision",
            Capability::Tools => "tools",
            Capability::Coding => "coding",
            Capability::Creative => "creative",
            Capability::Analysis => "analysis",
            Capability::ImageGeneration => "image_generation",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type CapabilitySet = BTreeSet<Capability>;

/// Data-handling tier. Ordered: `Public < Private < Regulated`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyTier {
    #[default]
    Public,
    Private,
    Regulated,
}

impl PrivacyTier {
    /// Whether a provider declared at `self` may serve a request demanding `required`.
    ///
    /// Regulated requests only match regulated providers; private requests accept private
    /// or regulated providers; public requests accept anything.
    pub fn satisfies(&self, required: PrivacyTier) -> bool {
        match required {
            PrivacyTier::Regulated => *self == PrivacyTier::Regulated,
            PrivacyTier::Private => *self >= PrivacyTier::Private,
            PrivacyTier::Public => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyTier::Public => "public",
            PrivacyTier::Private => "private",
            PrivacyTier::Regulated => "regulated",
        }
    }
}
