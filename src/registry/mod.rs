//! 提供商注册表：按 (provider, model) 缓存并管理提供商实例
//!
//! Provider registry mapping `(provider, model)` to live [`ProviderInstance`]s.
//!
//! Factories are installed per provider name. Instances are created lazily on first
//! lookup and reused afterwards; a caller-supplied credential always builds a fresh
//! instance that replaces the cached one. The registry is an explicit object: create one,
//! share it through an `Arc`, and hand it to the orchestrator.

use crate::credentials::CredentialStore;
use crate::provider::{
    HealthReport, ProviderConfig, ProviderDescriptor, ProviderInstance, ProviderKind,
};
use crate::transport::{Endpoint, ProviderTransport};
use crate::{Error, ErrorContext, Result};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

/// Credential used for throwaway health-check instances.
pub const HEALTH_CHECK_PLACEHOLDER_CREDENTIAL: &str = "health-check-placeholder";

/// Builds provider instances for one provider name.
pub trait ProviderFactory: Send + Sync {
    fn default_model(&self) -> &str;

    /// Constructs a new instance. `config.model` is always set by the registry.
    fn create(&self, config: &ProviderConfig) -> Result<ProviderInstance>;
}

/// Factory for a built-in [`ProviderKind`], sharing one transport.
pub struct BuiltinFactory {
    kind: ProviderKind,
    transport: Arc<dyn ProviderTransport>,
    catalog: Vec<ProviderDescriptor>,
}

impl BuiltinFactory {
    pub fn new(kind: ProviderKind, transport: Arc<dyn ProviderTransport>) -> Self {
        Self::with_catalog(kind, transport, ProviderDescriptor::defaults())
    }

    pub fn with_catalog(
        kind: ProviderKind,
        transport: Arc<dyn ProviderTransport>,
        catalog: Vec<ProviderDescriptor>,
    ) -> Self {
        let catalog = catalog
            .into_iter()
            .filter(|d| d.provider.eq_ignore_ascii_case(kind.name()))
            .collect();
        Self {
            kind,
            transport,
            catalog,
        }
    }

    fn descriptor_for(&self, model: &str) -> ProviderDescriptor {
        if let Some(d) = ProviderDescriptor::lookup(&self.catalog, self.kind.name(), model) {
            return d.clone();
        }
        // Unlisted model: inherit the default model's profile.
        let mut d = ProviderDescriptor::lookup(&self.catalog, self.kind.name(), self.kind.default_model())
            .cloned()
            .unwrap_or_else(|| ProviderDescriptor::new(self.kind.name(), model));
        d.model = model.to_string();
        d
    }
}

impl ProviderFactory for BuiltinFactory {
    fn default_model(&self) -> &str {
        self.kind.default_model()
    }

    fn create(&self, config: &ProviderConfig) -> Result<ProviderInstance> {
        if self.kind.requires_credential() && config.credential.is_none() {
            return Err(Error::AuthenticationFailed {
                message: format!("no credential configured for {}", self.kind),
                context: ErrorContext::new()
                    .with_provider(self.kind.name())
                    .with_source("provider_factory"),
            });
        }
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| self.kind.default_model().to_string());
        let base_url = match &config.base_url {
            Some(url) => validate_base_url(self.kind, url)?,
            None => self.kind.default_base_url().to_string(),
        };
        let endpoint = Endpoint {
            provider: self.kind.name().to_string(),
            model: model.clone(),
            base_url,
            path: self.kind.chat_path().to_string(),
            credential: config.credential.clone(),
        };
        let mut instance =
            ProviderInstance::new(self.descriptor_for(&model), endpoint, Arc::clone(&self.transport))
                .configured(config);
        if let Some(path) = self.kind.image_path() {
            instance = instance.with_image_path(path);
        }
        Ok(instance)
    }
}

/// Adapts a closure into a [`ProviderFactory`].
pub struct FnFactory<F> {
    default_model: String,
    build: F,
}

impl<F> FnFactory<F>
where
    F: Fn(&ProviderConfig) -> Result<ProviderInstance> + Send + Sync,
{
    pub fn new(default_model: impl Into<String>, build: F) -> Self {
        Self {
            default_model: default_model.into(),
            build,
        }
    }
}

impl<F> ProviderFactory for FnFactory<F>
where
    F: Fn(&ProviderConfig) -> Result<ProviderInstance> + Send + Sync,
{
    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn create(&self, config: &ProviderConfig) -> Result<ProviderInstance> {
        (self.build)(config)
    }
}

fn validate_base_url(kind: ProviderKind, raw: &str) -> Result<String> {
    let parsed = Url::parse(raw).map_err(|e| Error::Configuration {
        message: format!("invalid base URL '{}': {}", raw, e),
        context: ErrorContext::new()
            .with_provider(kind.name())
            .with_source("provider_factory"),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Configuration {
            message: format!("base URL '{}' must use http or https", raw),
            context: ErrorContext::new()
                .with_provider(kind.name())
                .with_source("provider_factory"),
        });
    }
    Ok(raw.trim_end_matches('/').to_string())
}

type InstanceKey = (String, String);

pub struct ProviderRegistry {
    factories: RwLock<HashMap<String, Arc<dyn ProviderFactory>>>,
    instances: Mutex<HashMap<InstanceKey, Arc<ProviderInstance>>>,
    credentials: Option<Arc<dyn CredentialStore>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// An empty registry; every provider must be registered explicitly.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
            credentials: None,
        }
    }

    /// A registry with a [`BuiltinFactory`] for every [`ProviderKind`].
    pub fn with_builtin(transport: Arc<dyn ProviderTransport>) -> Self {
        let registry = Self::new();
        for kind in ProviderKind::ALL {
            registry.register(kind.name(), BuiltinFactory::new(kind, Arc::clone(&transport)));
        }
        registry
    }

    pub fn with_credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    fn factories_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn ProviderFactory>>> {
        self.factories.read().unwrap_or_else(|p| p.into_inner())
    }

    /// Installs (or replaces) the constructor for `provider`.
    pub fn register(&self, provider: &str, factory: impl ProviderFactory + 'static) {
        let name = provider.to_ascii_lowercase();
        debug!(provider = %name, "registering provider factory");
        self.factories
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(name, Arc::new(factory));
    }

    fn factory(&self, provider: &str) -> Result<Arc<dyn ProviderFactory>> {
        self.factories_read().get(provider).cloned().ok_or_else(|| Error::Configuration {
            message: format!("unknown provider '{}'", provider),
            context: ErrorContext::new()
                .with_provider(provider)
                .with_source("provider_registry"),
        })
    }

    /// Returns the cached instance for `(provider, model)`, constructing it on first use.
    ///
    /// A credential in `config` always builds a new instance that replaces the cached one.
    /// Check-then-insert runs under one async lock, so concurrent first lookups for the same
    /// key observe a single instance.
    pub async fn get_provider(&self, config: &ProviderConfig) -> Result<Arc<ProviderInstance>> {
        let name = config.provider.to_ascii_lowercase();
        let factory = self.factory(&name)?;
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| factory.default_model().to_string());
        let key = (name.clone(), model.clone());

        let mut instances = self.instances.lock().await;
        let fresh_credential = config.credential.is_some();
        if !fresh_credential {
            if let Some(existing) = instances.get(&key) {
                return Ok(Arc::clone(existing));
            }
        }

        let mut resolved = config.clone();
        resolved.provider = name.clone();
        resolved.model = Some(model.clone());
        if resolved.credential.is_none() {
            if let Some(store) = &self.credentials {
                resolved.credential = store.resolve(&name).await;
            }
        }

        let instance = Arc::new(factory.create(&resolved)?);
        instances.insert(key, Arc::clone(&instance));
        info!(
            provider = %name,
            model = %model,
            replaced = fresh_credential,
            "provider instance created"
        );
        Ok(instance)
    }

    /// Sorted names of every registered provider.
    pub fn get_registered_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories_read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn supports(&self, provider: &str) -> bool {
        self.factories_read()
            .contains_key(&provider.to_ascii_lowercase())
    }

    /// Drops every cached instance (and with them their breaker state).
    pub async fn clear_cache(&self) {
        let mut instances = self.instances.lock().await;
        let n = instances.len();
        instances.clear();
        info!(instances = n, "provider instance cache cleared");
    }

    pub async fn cached_instances(&self) -> usize {
        self.instances.lock().await.len()
    }

    /// Probes every registered provider's default model through a throwaway instance built
    /// with a placeholder credential. One failure never aborts the others.
    pub async fn health_check_all(&self) -> Vec<HealthReport> {
        let factories: Vec<(String, Arc<dyn ProviderFactory>)> = {
            let mut all: Vec<_> = self
                .factories_read()
                .iter()
                .map(|(k, v)| (k.clone(), Arc::clone(v)))
                .collect();
            all.sort_by(|a, b| a.0.cmp(&b.0));
            all
        };

        let probes = factories.into_iter().map(|(name, factory)| async move {
            let model = factory.default_model().to_string();
            let config = ProviderConfig::new(name.clone())
                .with_model(model.clone())
                .with_credential(HEALTH_CHECK_PLACEHOLDER_CREDENTIAL);
            match factory.create(&config) {
                Ok(instance) => instance.health_check().await,
                Err(e) => HealthReport::unreachable(name, model, &e),
            }
        });
        join_all(probes).await
    }
}
