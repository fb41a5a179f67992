//! Tracing subscriber setup for binaries and tests embedding the orchestrator.
//!
//! The library itself only emits `tracing` events; installing a subscriber is the
//! application's choice.

use crate::{Error, ErrorContext, Result};
use std::env;
use tracing_subscriber::EnvFilter;

/// Filter variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "AI_ORCHESTRATOR_LOG";

const DEFAULT_FILTER: &str = "ai_lib_orchestrator=info";

/// Filter directives from `AI_ORCHESTRATOR_LOG`, then `RUST_LOG`, then the default.
pub fn filter_from_env() -> String {
    env::var(LOG_ENV)
        .ok()
        .or_else(|| env::var("RUST_LOG").ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Installs a global fmt subscriber with the given filter directives.
///
/// Fails if the directives do not parse or a global subscriber is already set.
pub fn try_init_tracing(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter).map_err(|e| Error::Configuration {
        message: format!("invalid log filter '{}': {}", filter, e),
        context: ErrorContext::new().with_source("logging"),
    })?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| Error::Configuration {
            message: format!("tracing subscriber already installed: {}", e),
            context: ErrorContext::new().with_source("logging"),
        })
}

/// Best-effort [`try_init_tracing`] with [`filter_from_env`]; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = try_init_tracing(&filter_from_env());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
