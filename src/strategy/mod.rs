//! 策略引擎模块：根据请求需求与约束对候选提供商进行过滤、评分与排序。
//!
//! # Strategy Engine
//!
//! [`StrategyEngine::determine`] turns a request into a ranked candidate list:
//!
//! 1. Classify complexity from the word count
//! 2. Filter the catalog by exclusions, privacy tier, capabilities, cost and latency ceilings
//!    (waived for preferred providers) and quality threshold
//! 3. Score survivors with the request's [`StrategyKind`]
//! 4. Sort descending; the first candidate is the primary, the rest are fallbacks
//!
//! | Strategy | Score |
//! |----------|-------|
//! | `cost_optimized` | inverse blended cost, cheapest = 100 |
//! | `performance` | inverse average latency, fastest = 100 |
//! | `privacy_first` | regulated 100, private 60, public 20, plus a tenth of quality |
//! | `balanced` | 0.4 quality + 0.3 inverse cost + 0.3 inverse latency |
//!
//! ```rust
//! use ai_lib_orchestrator::strategy::{StrategyEngine, StrategyKind};
//! use ai_lib_orchestrator::types::{ChatRequest, Constraints, Message};
//!
//! let engine = StrategyEngine::with_default_catalog();
//! let request = ChatRequest::builder()
//!     .message(Message::user("Hi"))
//!     .strategy(StrategyKind::CostOptimized)
//!     .constraints(Constraints::new().with_max_cost(0.001))
//!     .build()
//!     .unwrap();
//! let decision = engine.determine(&request).unwrap();
//! assert!(decision.primary().descriptor.cost_per_1k() <= 0.001);
//! ```

mod engine;
mod kind;

pub use engine::{RankedCandidate, StrategyDecision, StrategyEngine, PREFERRED_BONUS};
pub use kind::{Complexity, StrategyKind};
