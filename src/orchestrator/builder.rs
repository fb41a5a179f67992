use super::confidence::{ConfidenceScorer, HeuristicConfidenceScorer};
use super::core::Orchestrator;
use crate::cache::{CacheHierarchy, DistributedCacheBackend, SimilarityMatcher};
use crate::config::OrchestratorConfig;
use crate::credentials::{ChainedCredentialStore, CredentialStore};
use crate::registry::ProviderRegistry;
use crate::strategy::StrategyEngine;
use crate::transport::{HttpTransport, ProviderTransport};
use crate::Result;
use std::sync::Arc;

/// Builder for [`Orchestrator`].
///
/// Anything not supplied is derived from the [`OrchestratorConfig`]: a registry with every
/// built-in provider over [`HttpTransport`] and the standard credential chain, a strategy
/// engine over the configured (or built-in) catalog, and a cache hierarchy whose
/// distributed tier is disabled unless a backend is given.
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    registry: Option<Arc<ProviderRegistry>>,
    transport: Option<Arc<dyn ProviderTransport>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    engine: Option<Arc<StrategyEngine>>,
    cache: Option<Arc<CacheHierarchy>>,
    backend: Option<Arc<dyn DistributedCacheBackend>>,
    matcher: Option<Arc<dyn SimilarityMatcher>>,
    scorer: Arc<dyn ConfidenceScorer>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            registry: None,
            transport: None,
            credentials: None,
            engine: None,
            cache: None,
            backend: None,
            matcher: None,
            scorer: Arc::new(HeuristicConfidenceScorer::default()),
        }
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a prepared registry. Takes precedence over [`transport`](Self::transport) and
    /// [`credentials`](Self::credentials).
    pub fn registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Transport for the built-in provider factories.
    pub fn transport(mut self, transport: Arc<dyn ProviderTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn engine(mut self, engine: Arc<StrategyEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Use a prepared cache hierarchy; overrides [`cache_backend`](Self::cache_backend)
    /// and [`similarity_matcher`](Self::similarity_matcher).
    pub fn cache(mut self, cache: Arc<CacheHierarchy>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache_backend(mut self, backend: Arc<dyn DistributedCacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn similarity_matcher(mut self, matcher: Arc<dyn SimilarityMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn confidence_scorer(mut self, scorer: Arc<dyn ConfidenceScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let registry = match self.registry {
            Some(r) => r,
            None => {
                let transport: Arc<dyn ProviderTransport> = match self.transport {
                    Some(t) => t,
                    None => Arc::new(HttpTransport::new()?),
                };
                let credentials = self
                    .credentials
                    .unwrap_or_else(|| Arc::new(ChainedCredentialStore::standard()));
                Arc::new(ProviderRegistry::with_builtin(transport).with_credentials(credentials))
            }
        };

        let engine = self.engine.unwrap_or_else(|| {
            Arc::new(
                StrategyEngine::new(self.config.effective_catalog())
                    .with_default_strategy(self.config.default_strategy),
            )
        });

        let cache = match self.cache {
            Some(c) => c,
            None => {
                let mut cache = CacheHierarchy::new(self.config.cache.clone());
                if let Some(backend) = self.backend {
                    cache = cache.with_backend(backend);
                }
                if let Some(matcher) = self.matcher {
                    cache = cache.with_matcher(matcher);
                }
                Arc::new(cache)
            }
        };

        Ok(Orchestrator {
            registry,
            engine,
            cache,
            scorer: self.scorer,
            config: self.config,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
