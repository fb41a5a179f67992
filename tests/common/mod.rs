//! Scripted in-process transport and fixtures shared by the integration tests.

#![allow(dead_code)]

use ai_lib_orchestrator::credentials::StaticCredentialStore;
use ai_lib_orchestrator::provider::{ProviderDescriptor, ProviderKind};
use ai_lib_orchestrator::registry::{BuiltinFactory, ProviderRegistry};
use ai_lib_orchestrator::resilience::{CircuitBreakerConfig, RetryConfig};
use ai_lib_orchestrator::transport::{Endpoint, ProviderTransport, StreamChunk};
use ai_lib_orchestrator::{BoxStream, Error, Orchestrator, OrchestratorConfig, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What one call to a provider does.
#[derive(Debug, Clone)]
pub enum Outcome {
    Reply(String),
    Status(u16),
    /// 429 carrying a `Retry-After` hint.
    Throttled(Duration),
    Network,
}

impl Outcome {
    fn into_result(self) -> Result<String> {
        match self {
            Outcome::Reply(text) => Ok(text),
            Outcome::Status(status) => Err(Error::from_status(status, "scripted failure", None)),
            Outcome::Throttled(wait) => Err(Error::from_status(429, "slow down", Some(wait))),
            Outcome::Network => Err(Error::network("connection reset")),
        }
    }
}

/// Per-provider scripted transport. Queued outcomes are consumed first, then the
/// provider's default applies; providers with neither reply with `"<provider> says hi"`.
#[derive(Default)]
pub struct MockTransport {
    queued: Mutex<HashMap<String, VecDeque<Outcome>>>,
    defaults: Mutex<HashMap<String, Outcome>>,
    calls: Mutex<HashMap<String, u32>>,
    bodies: Mutex<Vec<Value>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn always(&self, provider: &str, outcome: Outcome) {
        self.defaults
            .lock()
            .unwrap()
            .insert(provider.to_string(), outcome);
    }

    pub fn script(&self, provider: &str, outcomes: Vec<Outcome>) {
        self.queued
            .lock()
            .unwrap()
            .entry(provider.to_string())
            .or_default()
            .extend(outcomes);
    }

    pub fn calls(&self, provider: &str) -> u32 {
        self.calls.lock().unwrap().get(provider).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    /// Request bodies in the order they were sent.
    pub fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }

    fn next_outcome(&self, endpoint: &Endpoint, body: &Value) -> Outcome {
        let provider = endpoint.provider.clone();
        *self.calls.lock().unwrap().entry(provider.clone()).or_default() += 1;
        self.bodies.lock().unwrap().push(body.clone());
        if let Some(outcome) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&provider)
            .and_then(VecDeque::pop_front)
        {
            return outcome;
        }
        self.defaults
            .lock()
            .unwrap()
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| Outcome::Reply(format!("{} says hi", provider)))
    }
}

#[async_trait]
impl ProviderTransport for MockTransport {
    async fn send(&self, endpoint: &Endpoint, body: &Value) -> Result<Value> {
        let text = self.next_outcome(endpoint, body).into_result()?;
        Ok(json!({
            "id": format!("{}-resp", endpoint.provider),
            "choices": [{ "message": { "content": text }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 20 }
        }))
    }

    async fn send_stream(&self, endpoint: &Endpoint, body: &Value) -> Result<BoxStream<'static, StreamChunk>> {
        let text = self.next_outcome(endpoint, body).into_result()?;
        let mut chunks: Vec<Result<StreamChunk>> = text
            .split_inclusive(' ')
            .map(|piece| {
                Ok(StreamChunk::Data(json!({
                    "choices": [{ "delta": { "content": piece } }]
                })))
            })
            .collect();
        chunks.push(Ok(StreamChunk::Data(json!({
            "choices": [{ "delta": {}, "finish_reason": "stop" }]
        }))));
        chunks.push(Ok(StreamChunk::End));
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Four providers, two of them under a 0.01 blended cost ceiling.
pub fn catalog() -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor::new("openai", "gpt-4o")
            .with_pricing(0.025, 0.05)
            .with_latency_ms(900)
            .with_quality(92.0),
        ProviderDescriptor::new("anthropic", "claude-3-5-sonnet-latest")
            .with_pricing(0.015, 0.03)
            .with_latency_ms(1_100)
            .with_quality(94.0),
        ProviderDescriptor::new("groq", "llama-3.1-70b-versatile")
            .with_pricing(0.0006, 0.0008)
            .with_latency_ms(250)
            .with_quality(79.0),
        ProviderDescriptor::new("mistral", "mistral-large-latest")
            .with_pricing(0.002, 0.006)
            .with_latency_ms(800)
            .with_quality(85.0),
    ]
}

pub fn registry(transport: Arc<MockTransport>, catalog: &[ProviderDescriptor]) -> Arc<ProviderRegistry> {
    let mut credentials = StaticCredentialStore::new();
    for kind in ProviderKind::ALL {
        credentials = credentials.with(kind.name(), format!("{}-key", kind.name()));
    }
    let registry = ProviderRegistry::new().with_credentials(Arc::new(credentials));
    for kind in ProviderKind::ALL {
        let transport: Arc<dyn ProviderTransport> = transport.clone();
        registry.register(
            kind.name(),
            BuiltinFactory::with_catalog(kind, transport, catalog.to_vec()),
        );
    }
    Arc::new(registry)
}

/// No retries and a breaker that never trips, so every failure is visible to fallback.
pub fn quiet_config(catalog: Vec<ProviderDescriptor>) -> OrchestratorConfig {
    OrchestratorConfig::new()
        .with_retry(RetryConfig::disabled())
        .with_circuit_breaker(CircuitBreakerConfig::new().with_failure_threshold(1_000))
        .with_catalog(catalog)
}

pub fn orchestrator(transport: Arc<MockTransport>) -> Orchestrator {
    orchestrator_with(transport, quiet_config(catalog()))
}

pub fn orchestrator_with(transport: Arc<MockTransport>, config: OrchestratorConfig) -> Orchestrator {
    let catalog = config.effective_catalog();
    Orchestrator::builder()
        .registry(registry(transport, &catalog))
        .config(config)
        .build()
        .expect("orchestrator builds")
}
