//! Token 计数与成本估算模块：为选路与结果成本汇总提供估算。
//!
//! # Token Counting and Cost Estimation
//!
//! Pure, offline helpers used for pre-call planning (`estimate_cost`), cost ceilings in
//! provider selection, and the cost summary of every orchestration result.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TokenCounter`] | Trait for token counting implementations |
//! | [`CharacterEstimator`] | Fast character-based approximation (4 chars ≈ 1 token) |
//! | [`AnthropicEstimator`] | Anthropic-flavoured estimation |
//! | [`ModelPricing`] | Price per 1000 input/output tokens |
//! | [`CostEstimate`] | Cost breakdown |

mod counter;
mod pricing;

pub use counter::{counter_for, AnthropicEstimator, CharacterEstimator, TokenCounter};
pub use pricing::{CostEstimate, ModelPricing};
