//! Live provider instances.

use crate::provider::payload::{self, GeneratedImage};
use crate::provider::stream::{ChatStream, DEFAULT_STREAM_BUFFER};
use crate::provider::ProviderDescriptor;
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState, RetryConfig,
    RetryHandler,
};
use crate::tokens::{counter_for, CostEstimate, TokenCounter};
use crate::transport::{Endpoint, ProviderTransport};
use crate::types::{Capability, CapabilitySet, ChatRequest, ChatResponse};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Completion length assumed by [`ProviderInstance::estimate_cost`] when the request sets
/// no `max_tokens`.
pub const DEFAULT_COMPLETION_ESTIMATE: u32 = 256;

/// Everything needed to construct (or look up) one provider instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: String,
    /// Falls back to the factory's default model.
    #[serde(default)]
    pub model: Option<String>,
    /// A caller-supplied credential always yields a fresh instance.
    #[serde(default, skip_serializing)]
    pub credential: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

fn default_health_timeout_ms() -> u64 {
    5_000
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: None,
            credential: None,
            base_url: None,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            call_timeout_ms: default_call_timeout_ms(),
            health_timeout_ms: default_health_timeout_ms(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, cfg: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = cfg;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

/// Result of a health probe. Never an error: failures are reported as `healthy: false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub provider: String,
    pub model: String,
    pub healthy: bool,
    pub latency_ms: u64,
    pub circuit_state: CircuitState,
    pub consecutive_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    /// Report for a provider that could not even be constructed.
    pub fn unreachable(provider: impl Into<String>, model: impl Into<String>, error: &Error) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            healthy: false,
            latency_ms: 0,
            circuit_state: CircuitState::Closed,
            consecutive_failures: 0,
            error: Some(error.to_string()),
        }
    }
}

/// A live (provider, model, credential) binding.
///
/// Owns one retry handler, one circuit breaker and a transport handle. Chat and stream calls
/// run `breaker → retry → per-attempt timeout → transport`.
pub struct ProviderInstance {
    descriptor: ProviderDescriptor,
    endpoint: Endpoint,
    image_path: Option<String>,
    transport: Arc<dyn ProviderTransport>,
    retry: RetryHandler,
    breaker: CircuitBreaker,
    counter: Arc<dyn TokenCounter>,
    call_timeout: Duration,
    health_timeout: Duration,
    stream_buffer: usize,
}

impl ProviderInstance {
    pub fn new(
        descriptor: ProviderDescriptor,
        endpoint: Endpoint,
        transport: Arc<dyn ProviderTransport>,
    ) -> Self {
        let breaker = CircuitBreaker::new(&descriptor.provider, CircuitBreakerConfig::default());
        let counter = counter_for(&descriptor.provider);
        Self {
            descriptor,
            endpoint,
            image_path: None,
            transport,
            retry: RetryHandler::new(RetryConfig::default()),
            breaker,
            counter,
            call_timeout: Duration::from_millis(default_call_timeout_ms()),
            health_timeout: Duration::from_millis(default_health_timeout_ms()),
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Applies the resilience and timeout settings from `config`.
    pub fn configured(self, config: &ProviderConfig) -> Self {
        self.with_retry(config.retry.clone())
            .with_circuit_breaker(config.circuit_breaker.clone())
            .with_call_timeout(config.call_timeout())
            .with_health_timeout(config.health_timeout())
    }

    pub fn with_retry(mut self, cfg: RetryConfig) -> Self {
        self.retry = RetryHandler::new(cfg);
        self
    }

    pub fn with_circuit_breaker(mut self, cfg: CircuitBreakerConfig) -> Self {
        self.breaker = CircuitBreaker::new(&self.descriptor.provider, cfg);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn with_image_path(mut self, path: impl Into<String>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    pub fn with_stream_buffer(mut self, buffer: usize) -> Self {
        self.stream_buffer = buffer.max(1);
        self
    }

    pub fn provider(&self) -> &str {
        &self.descriptor.provider
    }

    pub fn model(&self) -> &str {
        &self.descriptor.model
    }

    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.descriptor.capabilities
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn breaker_snapshot(&self) -> CircuitBreakerSnapshot {
        self.breaker.snapshot()
    }

    fn label(&self) -> String {
        format!("{}/{}", self.descriptor.provider, self.descriptor.model)
    }

    fn tag(&self, err: Error) -> Error {
        err.with_provider(&self.descriptor.provider, &self.descriptor.model)
    }

    async fn bounded<T, Fut>(&self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(r) => r,
            Err(_) => Err(Error::Timeout {
                after: self.call_timeout,
                context: ErrorContext::new().with_source("provider_instance"),
            }),
        }
    }

    async fn send_guarded(&self, endpoint: &Endpoint, body: &serde_json::Value) -> Result<serde_json::Value> {
        let label = self.label();
        self.breaker
            .call(|| {
                self.retry.execute(&label, |_| {
                    self.bounded(self.transport.send(endpoint, body))
                })
            })
            .await
            .map_err(|e| self.tag(e))
    }

    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = payload::chat_body(&self.descriptor.model, request, false);
        let value = self.send_guarded(&self.endpoint, &body).await?;
        let response = payload::parse_chat_response(&self.descriptor.provider, &self.descriptor.model, value)?;
        debug!(
            provider = %self.descriptor.provider,
            model = %self.descriptor.model,
            total_tokens = response.usage.total_tokens(),
            "chat completion succeeded"
        );
        Ok(response)
    }

    /// Opens a cancellable stream. Retry and the breaker cover establishing the stream
    /// only; a failure after the first chunk ends the stream with that error.
    pub async fn stream_chat_completion(&self, request: &ChatRequest) -> Result<ChatStream> {
        let body = payload::chat_body(&self.descriptor.model, request, true);
        let label = self.label();
        let upstream = self
            .breaker
            .call(|| {
                self.retry.execute(&label, |_| {
                    self.bounded(self.transport.send_stream(&self.endpoint, &body))
                })
            })
            .await
            .map_err(|e| self.tag(e))?;
        Ok(ChatStream::spawn(
            upstream,
            self.descriptor.provider.clone(),
            self.descriptor.model.clone(),
            self.stream_buffer,
        ))
    }

    /// Pure estimate: prompt tokens from the messages, completion tokens from `max_tokens`.
    pub fn estimate_cost(&self, request: &ChatRequest) -> CostEstimate {
        let input = self.counter.count_messages(request.messages()) as u32;
        let output = request
            .params()
            .max_tokens
            .unwrap_or(DEFAULT_COMPLETION_ESTIMATE);
        self.descriptor
            .pricing
            .calculate_cost(&self.descriptor.model, input, output)
    }

    /// Actual cost for reported usage.
    pub fn cost_of(&self, response: &ChatResponse) -> CostEstimate {
        self.descriptor.pricing.calculate_cost(
            &self.descriptor.model,
            response.usage.prompt_tokens,
            response.usage.completion_tokens,
        )
    }

    /// One lightweight round trip, bypassing retry and the breaker so probes never move
    /// breaker state.
    pub async fn health_check(&self) -> HealthReport {
        let started = Instant::now();
        let body = payload::probe_body(&self.descriptor.model);
        let outcome =
            tokio::time::timeout(self.health_timeout, self.transport.send(&self.endpoint, &body)).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let error = match outcome {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "health probe timed out after {}ms",
                self.health_timeout.as_millis()
            )),
        };
        if let Some(e) = &error {
            warn!(provider = %self.descriptor.provider, model = %self.descriptor.model, error = %e, "health probe failed");
        }

        let snapshot = self.breaker.snapshot();
        HealthReport {
            provider: self.descriptor.provider.clone(),
            model: self.descriptor.model.clone(),
            healthy: error.is_none(),
            latency_ms,
            circuit_state: snapshot.state,
            consecutive_failures: snapshot.consecutive_failures,
            error,
        }
    }

    pub async fn generate_images(&self, prompt: &str, count: u32) -> Result<Vec<GeneratedImage>> {
        let path = match (&self.image_path, self.descriptor.has(Capability::ImageGeneration)) {
            (Some(path), true) => path.clone(),
            _ => {
                return Err(self.tag(Error::Validation {
                    message: format!("{} does not support image generation", self.label()),
                    context: ErrorContext::new().with_source("provider_instance"),
                }))
            }
        };
        let endpoint = self.endpoint.with_path(path);
        let body = payload::image_body(&self.descriptor.model, prompt, count);
        let value = self.send_guarded(&endpoint, &body).await?;
        payload::parse_images(&self.descriptor.provider, value)
    }
}

impl std::fmt::Debug for ProviderInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderInstance")
            .field("provider", &self.descriptor.provider)
            .field("model", &self.descriptor.model)
            .field("base_url", &self.endpoint.base_url)
            .field("circuit_state", &self.breaker.state())
            .finish()
    }
}
