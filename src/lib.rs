//! # ai-lib-orchestrator
//!
//! 多厂商 AI 请求编排运行时：弹性重试与熔断、基于策略的提供商选择与自动回退、三级响应缓存。
//!
//! Provider orchestration runtime: routes chat requests to one of several interchangeable
//! AI providers, tolerates provider failures and avoids paying twice for the same answer.
//!
//! ## Overview
//!
//! Data flows strictly downward:
//!
//! ```text
//! Orchestrator → StrategyEngine → ProviderRegistry → ProviderInstance → (retry, breaker) → Transport
//!      └── CacheHierarchy (consulted first, written last)
//! ```
//!
//! ## Key Features
//!
//! - **Resilience**: capped exponential backoff with jitter and a closed/open/half-open
//!   circuit breaker per provider instance, see [`resilience`]
//! - **Provider selection**: cost, performance, privacy and balanced strategies with a
//!   ranked fallback chain, see [`strategy`]
//! - **Caching**: pattern, in-process and distributed tiers with content-driven TTLs,
//!   see [`cache`]
//! - **Streaming**: cancellable response streams over a bounded channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_lib_orchestrator::{ChatRequest, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> ai_lib_orchestrator::Result<()> {
//!     ai_lib_orchestrator::logging::init_tracing();
//!     let orchestrator = Orchestrator::builder().build()?;
//!
//!     let result = orchestrator.execute(&ChatRequest::user("Hello!")).await?;
//!     println!(
//!         "{} (provider: {}, cache hit: {}, cost: ${:.6})",
//!         result.content(),
//!         result.provider,
//!         result.cache_hit,
//!         result.cost.total_cost
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`orchestrator`] | Top-level entry point: execute, ask, workflow, streaming |
//! | [`strategy`] | Candidate filtering and scoring |
//! | [`registry`] | `(provider, model)` → instance map and provider factories |
//! | [`provider`] | Provider variants, descriptors, instances and streams |
//! | [`cache`] | Three-tier response cache and specialized caches |
//! | [`resilience`] | Retry handler and circuit breaker |
//! | [`transport`] | Transport contract and the reqwest implementation |
//! | [`credentials`] | Credential stores (static, env, keyring) |
//! | [`types`] | Requests, responses, capabilities |
//! | [`tokens`] | Token estimation and pricing |
//! | [`config`] | Serde configuration with env overrides |

pub mod cache;
pub mod config;
pub mod credentials;
pub mod error_code;
pub mod logging;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod resilience;
pub mod strategy;
pub mod tokens;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use config::OrchestratorConfig;
pub use error_code::ErrorKind;
pub use orchestrator::{AskOptions, OrchestrationResult, Orchestrator, OrchestratorBuilder};
pub use provider::{ProviderConfig, ProviderDescriptor, ProviderKind};
pub use registry::ProviderRegistry;
pub use strategy::{StrategyEngine, StrategyKind};
pub use types::{
    message::{Message, MessageRole},
    ChatRequest, ChatResponse, StreamEvent,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
