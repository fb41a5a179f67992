//! Orchestrator configuration.
//!
//! Loadable from YAML or JSON. Environment variables override the loaded values:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `AI_ORCHESTRATOR_TIMEOUT_SECS` | `call_timeout_ms` |
//! | `AI_ORCHESTRATOR_MAX_RETRIES` | `retry.max_retries` |
//! | `AI_ORCHESTRATOR_CACHE_NAMESPACE` | `cache.namespace` |

use crate::cache::{CacheConfig, TtlPolicy};
use crate::provider::{ProviderConfig, ProviderDescriptor};
use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::strategy::StrategyKind;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const ENV_TIMEOUT_SECS: &str = "AI_ORCHESTRATOR_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "AI_ORCHESTRATOR_MAX_RETRIES";
pub const ENV_CACHE_NAMESPACE: &str = "AI_ORCHESTRATOR_CACHE_NAMESPACE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub cache: CacheConfig,
    /// Per provider call, per attempt.
    pub call_timeout_ms: u64,
    pub default_strategy: StrategyKind,
    /// Replaces the built-in catalog when non-empty.
    pub catalog: Vec<ProviderDescriptor>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            cache: CacheConfig::default(),
            call_timeout_ms: 30_000,
            default_strategy: StrategyKind::default(),
            catalog: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).map_err(|e| Error::Configuration {
            message: format!("invalid orchestrator config: {}", e),
            context: ErrorContext::new().with_source("config_yaml"),
        })
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::Configuration {
            message: format!("invalid orchestrator config: {}", e),
            context: ErrorContext::new().with_source("config_json"),
        })
    }

    /// Reads `path` (JSON when the extension is `.json`, YAML otherwise) and applies
    /// environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::Configuration {
            message: format!("failed to read {}: {}", path.display(), e),
            context: ErrorContext::new().with_source("config_file"),
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };
        debug!(path = %path.display(), "orchestrator config loaded");
        config.with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Applies overrides from `lookup`. Unparseable values are configuration errors.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup(ENV_TIMEOUT_SECS) {
            let secs = parse_env::<u64>(ENV_TIMEOUT_SECS, &v)?;
            self.call_timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(v) = lookup(ENV_MAX_RETRIES) {
            self.retry.max_retries = parse_env::<u32>(ENV_MAX_RETRIES, &v)?;
        }
        if let Some(v) = lookup(ENV_CACHE_NAMESPACE) {
            let ns = v.trim();
            if !ns.is_empty() {
                self.cache.namespace = ns.to_string();
            }
        }
        Ok(self)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, cfg: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = cfg;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_ttl_policy(mut self, ttl: TtlPolicy) -> Self {
        self.cache.ttl = ttl;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_default_strategy(mut self, strategy: StrategyKind) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn with_catalog(mut self, catalog: Vec<ProviderDescriptor>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// The configured catalog, or the built-in one when none is set.
    pub fn effective_catalog(&self) -> Vec<ProviderDescriptor> {
        if self.catalog.is_empty() {
            ProviderDescriptor::defaults()
        } else {
            self.catalog.clone()
        }
    }

    /// Instance settings for one `(provider, model)` candidate.
    pub fn provider_config(&self, provider: &str, model: &str) -> ProviderConfig {
        ProviderConfig::new(provider)
            .with_model(model)
            .with_retry(self.retry.clone())
            .with_circuit_breaker(self.circuit_breaker.clone())
            .with_call_timeout(self.call_timeout())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| Error::Configuration {
        message: format!("{} has an invalid value '{}'", key, value),
        context: ErrorContext::new().with_source("environment"),
    })
}
