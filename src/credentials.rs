//! Credential resolution.
//!
//! Lookup order used by [`ChainedCredentialStore::standard`]: OS keyring first, then the
//! `{PROVIDER}_API_KEY` environment variable.

use async_trait::async_trait;
use keyring::Entry;
use std::collections::HashMap;
use std::env;
use tracing::debug;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Credential for `provider`, if one is known. Lookup failures resolve to `None`.
    async fn resolve(&self, provider: &str) -> Option<String>;
}

/// Fixed in-memory credentials.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    keys: HashMap<String, String>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl Into<String>, credential: impl Into<String>) -> Self {
        self.keys
            .insert(provider.into().to_ascii_lowercase(), credential.into());
        self
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn resolve(&self, provider: &str) -> Option<String> {
        self.keys.get(&provider.to_ascii_lowercase()).cloned()
    }
}

/// Reads `{PROVIDER}_API_KEY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialStore;

impl EnvCredentialStore {
    pub fn var_name(provider: &str) -> String {
        format!("{}_API_KEY", provider.to_uppercase().replace('-', "_"))
    }
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn resolve(&self, provider: &str) -> Option<String> {
        env::var(Self::var_name(provider))
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}

/// OS keyring entries stored under `service` with the provider name as user.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("ai-orchestrator")
    }
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn resolve(&self, provider: &str) -> Option<String> {
        let service = self.service.clone();
        let user = provider.to_ascii_lowercase();
        // Platform keyrings block; keep them off the async workers.
        let lookup = tokio::task::spawn_blocking(move || {
            Entry::new(&service, &user).and_then(|entry| entry.get_password())
        })
        .await;
        match lookup {
            Ok(Ok(key)) => Some(key),
            Ok(Err(e)) => {
                debug!(provider, error = %e, "no keyring credential");
                None
            }
            Err(e) => {
                debug!(provider, error = %e, "keyring lookup task failed");
                None
            }
        }
    }
}

/// Tries each store in order and returns the first credential found.
#[derive(Default)]
pub struct ChainedCredentialStore {
    stores: Vec<Box<dyn CredentialStore>>,
}

impl ChainedCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyring, then environment.
    pub fn standard() -> Self {
        Self::new()
            .with(KeyringCredentialStore::default())
            .with(EnvCredentialStore)
    }

    pub fn with(mut self, store: impl CredentialStore + 'static) -> Self {
        self.stores.push(Box::new(store));
        self
    }
}

#[async_trait]
impl CredentialStore for ChainedCredentialStore {
    async fn resolve(&self, provider: &str) -> Option<String> {
        for store in &self.stores {
            if let Some(key) = store.resolve(provider).await {
                return Some(key);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_store_is_case_insensitive() {
        let store = StaticCredentialStore::new().with("OpenAI", "sk-1");
        assert_eq!(store.resolve("openai").await.as_deref(), Some("sk-1"));
        assert_eq!(store.resolve("groq").await, None);
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(EnvCredentialStore::var_name("openai"), "OPENAI_API_KEY");
        assert_eq!(EnvCredentialStore::var_name("azure-openai"), "AZURE_OPENAI_API_KEY");
    }

    #[tokio::test]
    async fn test_chain_falls_through() {
        let chain = ChainedCredentialStore::new()
            .with(StaticCredentialStore::new().with("anthropic", "a-key"))
            .with(StaticCredentialStore::new().with("openai", "o-key"));
        assert_eq!(chain.resolve("openai").await.as_deref(), Some("o-key"));
        assert_eq!(chain.resolve("anthropic").await.as_deref(), Some("a-key"));
        assert_eq!(chain.resolve("mistral").await, None);
    }
}
