//! 弹性模式模块：提供重试与熔断器等可靠性保障机制。
//!
//! # Resilience Primitives Module
//!
//! Every provider instance owns one [`RetryHandler`] and one [`CircuitBreaker`]. Retries
//! run *inside* a single breaker-guarded call; breaker state persists *across* calls.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`retry`] | Capped exponential backoff with jitter and error classification |
//! | [`circuit_breaker`] | Closed / open / half-open failure isolation |
//!
//! ## Circuit Breaker
//!
//! - **Closed**: Normal operation, consecutive failures are counted
//! - **Open**: Threshold reached, calls fail fast with `CircuitOpen`
//! - **Half-Open**: Recovery timeout elapsed, exactly one trial call is admitted
//!
//! ```rust
//! use ai_lib_orchestrator::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::new()
//!     .with_failure_threshold(5)
//!     .with_recovery_timeout(Duration::from_secs(30));
//! let breaker = CircuitBreaker::new("openai", config);
//!
//! if let Ok(permit) = breaker.acquire() {
//!     // Make the provider call...
//!     permit.succeed();
//! };
//! ```
//!
//! ## Retry
//!
//! ```rust
//! use ai_lib_orchestrator::resilience::retry::{RetryConfig, RetryHandler};
//! use std::time::Duration;
//!
//! let handler = RetryHandler::new(
//!     RetryConfig::new()
//!         .with_max_retries(3)
//!         .with_base_delay(Duration::from_millis(200)),
//! );
//! assert_eq!(handler.backoff(1), Duration::from_millis(400));
//! ```

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState,
};
pub use retry::{RetryClass, RetryConfig, RetryHandler};
