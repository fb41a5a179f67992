//! 编排器模块：缓存查询、策略排序、带回退的执行以及结果写回的统一入口。
//!
//! # Orchestrator
//!
//! The single entry point for callers. For every request:
//!
//! 1. Look up the [`CacheHierarchy`](crate::cache::CacheHierarchy); a hit returns at once
//! 2. Ask the [`StrategyEngine`](crate::strategy::StrategyEngine) for ranked candidates
//! 3. Call the primary through the registry (retry and breaker live in the instance)
//! 4. On a fallback-eligible failure try the next candidate; exhaustion yields
//!    `AllProvidersFailed`
//! 5. Score cost, performance and confidence, write through the cache, return
//!
//! Fallback-eligible: rate limit, server error, network, timeout, circuit open.
//! Authentication and validation errors stop the chain.
//!
//! ```rust,no_run
//! use ai_lib_orchestrator::orchestrator::{AskOptions, Orchestrator, WorkflowStep};
//! use ai_lib_orchestrator::strategy::StrategyKind;
//!
//! # async fn run() -> ai_lib_orchestrator::Result<()> {
//! let orchestrator = Orchestrator::builder().build()?;
//!
//! let answer = orchestrator
//!     .ask("Explain backpressure", AskOptions::new().with_strategy(StrategyKind::CostOptimized))
//!     .await?;
//! println!("{} via {}", answer.content(), answer.provider);
//!
//! let steps = orchestrator
//!     .workflow(vec![
//!         WorkflowStep::new("outline", "Outline a post about retries"),
//!         WorkflowStep::new("draft", "Write the post from this outline: {{outline.output}}"),
//!     ])
//!     .await?;
//! println!("{}", steps[1].output());
//! # Ok(())
//! # }
//! ```

mod builder;
mod confidence;
mod core;
mod result;
mod workflow;

pub use builder::OrchestratorBuilder;
pub use confidence::{ConfidenceInput, ConfidenceScorer, HeuristicConfidenceScorer};
pub use self::core::Orchestrator;
pub use result::{
    ConfidenceSummary, FailedAttempt, OrchestratedStream, OrchestrationResult, PerformanceSummary,
};
pub use workflow::{substitute_outputs, AskOptions, WorkflowStep, WorkflowStepResult};
