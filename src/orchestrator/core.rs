//! The top-level request path: cache, rank, execute with fallback, write back.

use super::builder::OrchestratorBuilder;
use super::confidence::{ConfidenceInput, ConfidenceScorer};
use super::result::{FailedAttempt, OrchestratedStream, OrchestrationResult, PerformanceSummary};
use super::workflow::{substitute_outputs, validate_steps, AskOptions, WorkflowStep, WorkflowStepResult};
use crate::cache::{CacheEntry, CacheHierarchy, CacheHit};
use crate::config::OrchestratorConfig;
use crate::provider::{ProviderDescriptor, ProviderInstance, DEFAULT_COMPLETION_ESTIMATE};
use crate::registry::ProviderRegistry;
use crate::strategy::{Complexity, RankedCandidate, StrategyDecision, StrategyEngine};
use crate::tokens::{counter_for, CostEstimate};
use crate::types::ChatRequest;
use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct Orchestrator {
    pub(super) registry: Arc<ProviderRegistry>,
    pub(super) engine: Arc<StrategyEngine>,
    pub(super) cache: Arc<CacheHierarchy>,
    pub(super) scorer: Arc<dyn ConfidenceScorer>,
    pub(super) config: OrchestratorConfig,
}

/// Outcome of walking the ranked candidates for one request.
struct Served<T> {
    value: T,
    instance: Arc<ProviderInstance>,
    candidate_index: usize,
    call_elapsed: std::time::Duration,
    attempted: Vec<FailedAttempt>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<StrategyEngine> {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<CacheHierarchy> {
        &self.cache
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Serves `request` from the cache or the best available provider.
    ///
    /// Errors carry the request's correlation id.
    pub async fn execute(&self, request: &ChatRequest) -> Result<OrchestrationResult> {
        let request_id = Uuid::new_v4().to_string();
        self.execute_inner(request, &request_id)
            .await
            .map_err(|e| e.with_request_id(&request_id))
    }

    async fn execute_inner(&self, request: &ChatRequest, request_id: &str) -> Result<OrchestrationResult> {
        let started = Instant::now();
        let complexity = Complexity::from_word_count(request.word_count());
        let key = self.cache.key_for(request);

        if let Some(hit) = self.cache.lookup_key(&key).await {
            return Ok(self.cached_result(request, request_id, complexity, hit, started));
        }

        let decision = self.engine.determine(request)?;
        let served = self
            .run_candidates(&decision, request_id, |instance| async move {
                instance.chat_completion(request).await
            })
            .await?;

        let response = served.value;
        let candidate = &decision.candidates[served.candidate_index];
        let fallback_used = served.candidate_index > 0;
        let cost = served.instance.cost_of(&response);
        let confidence = self.scorer.score(&ConfidenceInput {
            request,
            response: &response,
            descriptor: served.instance.descriptor(),
            cost: &cost,
            elapsed: served.call_elapsed,
            fallback_used,
        });

        if let Some(class) = self.cache.store(request, &response).await {
            debug!(request_id, ttl_class = class.as_str(), "response cached");
        }

        let elapsed = started.elapsed();
        info!(
            request_id,
            provider = %candidate.provider(),
            model = %candidate.model(),
            fallback_used,
            elapsed_ms = elapsed.as_millis() as u64,
            cost = cost.total_cost,
            "request served"
        );

        Ok(OrchestrationResult {
            request_id: request_id.to_string(),
            provider: candidate.provider().to_string(),
            model: candidate.model().to_string(),
            strategy: Some(decision.strategy),
            complexity,
            fallback_used,
            cache_hit: false,
            cache_tier: None,
            attempted: served.attempted,
            performance: PerformanceSummary::new(elapsed, response.usage.total_tokens()),
            cost,
            confidence,
            response,
        })
    }

    fn cached_result(
        &self,
        request: &ChatRequest,
        request_id: &str,
        complexity: Complexity,
        hit: CacheHit,
        started: Instant,
    ) -> OrchestrationResult {
        let CacheHit { entry, tier } = hit;
        let catalog = self.engine.catalog();
        let descriptor = ProviderDescriptor::lookup(&catalog, &entry.provider, &entry.model)
            .cloned()
            .unwrap_or_else(|| ProviderDescriptor::new(entry.provider.clone(), entry.model.clone()));

        let avoided = avoided_cost(request, &entry, &descriptor);
        self.cache.record_cost_avoided(avoided.total_cost);

        let elapsed = started.elapsed();
        let cost = CostEstimate {
            model: entry.model.clone(),
            currency: descriptor.pricing.currency.clone(),
            ..Default::default()
        };
        let confidence = self.scorer.score(&ConfidenceInput {
            request,
            response: &entry.response,
            descriptor: &descriptor,
            cost: &cost,
            elapsed,
            fallback_used: false,
        });
        info!(
            request_id,
            tier = %tier,
            provider = %entry.provider,
            cost_avoided = avoided.total_cost,
            "request served from cache"
        );

        OrchestrationResult {
            request_id: request_id.to_string(),
            provider: entry.provider,
            model: entry.model,
            strategy: None,
            complexity,
            fallback_used: false,
            cache_hit: true,
            cache_tier: Some(tier),
            attempted: Vec::new(),
            performance: PerformanceSummary::new(elapsed, entry.response.usage.total_tokens()),
            cost,
            confidence,
            response: entry.response,
        }
    }

    /// Tries candidates in rank order. Fallback-eligible failures (and candidates the
    /// registry cannot build) move on to the next one; any other error stops the chain.
    async fn run_candidates<T, F, Fut>(
        &self,
        decision: &StrategyDecision,
        request_id: &str,
        call: F,
    ) -> Result<Served<T>>
    where
        F: Fn(Arc<ProviderInstance>) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempted = Vec::new();
        let mut last_error: Option<Error> = None;

        for (index, candidate) in decision.candidates.iter().enumerate() {
            let instance = match self.instance_for(candidate).await {
                Ok(instance) => instance,
                Err(e) => {
                    warn!(
                        request_id,
                        candidate = %candidate.label(),
                        error = %e,
                        "candidate unavailable, skipping"
                    );
                    attempted.push(FailedAttempt::new(candidate.provider(), candidate.model(), &e));
                    last_error = Some(e);
                    continue;
                }
            };

            let call_started = Instant::now();
            match call(Arc::clone(&instance)).await {
                Ok(value) => {
                    return Ok(Served {
                        value,
                        instance,
                        candidate_index: index,
                        call_elapsed: call_started.elapsed(),
                        attempted,
                    });
                }
                Err(e) if e.kind().fallbackable() => {
                    warn!(
                        request_id,
                        candidate = %candidate.label(),
                        error_kind = e.kind().name(),
                        error = %e,
                        remaining = decision.candidates.len() - index - 1,
                        "provider failed, falling back"
                    );
                    attempted.push(FailedAttempt::new(candidate.provider(), candidate.model(), &e));
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(
                        request_id,
                        candidate = %candidate.label(),
                        error_kind = e.kind().name(),
                        "provider failed with a non-fallback error"
                    );
                    return Err(e);
                }
            }
        }

        let primary = decision.primary().label();
        let fallbacks: Vec<String> = attempted
            .iter()
            .map(FailedAttempt::label)
            .filter(|label| *label != primary)
            .collect();
        warn!(request_id, primary = %primary, fallbacks = fallbacks.len(), "all providers failed");
        Err(Error::AllProvidersFailed {
            primary,
            attempted: fallbacks,
            context: ErrorContext::new()
                .with_source("orchestrator")
                .with_details(last_error.map(|e| e.to_string()).unwrap_or_default()),
        })
    }

    async fn instance_for(&self, candidate: &RankedCandidate) -> Result<Arc<ProviderInstance>> {
        let config = self
            .config
            .provider_config(candidate.provider(), candidate.model());
        self.registry.get_provider(&config).await
    }

    /// Single-prompt convenience over [`execute`](Self::execute).
    pub async fn ask(&self, prompt: &str, options: AskOptions) -> Result<OrchestrationResult> {
        let request = options.to_request(prompt)?;
        self.execute(&request).await
    }

    /// Runs steps in order, substituting `{{name.output}}` with earlier outputs. The first
    /// failing step aborts the workflow.
    pub async fn workflow(&self, steps: Vec<WorkflowStep>) -> Result<Vec<WorkflowStepResult>> {
        validate_steps(&steps)?;
        let mut outputs: HashMap<String, String> = HashMap::new();
        let mut results = Vec::with_capacity(steps.len());

        for step in steps {
            let prompt = substitute_outputs(&step.prompt, &outputs);
            debug!(step = %step.name, "running workflow step");
            let result = self.ask(&prompt, step.options).await.map_err(|e| {
                let name = step.name.clone();
                e.map_context(|c| c.with_details(format!("workflow step '{}'", name)))
            })?;
            outputs.insert(step.name.clone(), result.content().to_string());
            results.push(WorkflowStepResult {
                name: step.name,
                prompt,
                result,
            });
        }
        Ok(results)
    }

    /// Opens a stream on the best available provider, falling back only while establishing
    /// it. Streams bypass the cache.
    pub async fn execute_stream(&self, request: &ChatRequest) -> Result<OrchestratedStream> {
        let request_id = Uuid::new_v4().to_string();
        let attempt = async {
            let decision = self.engine.determine(request)?;
            let served = self
                .run_candidates(&decision, &request_id, |instance| async move {
                    instance.stream_chat_completion(request).await
                })
                .await?;
            let candidate = &decision.candidates[served.candidate_index];
            info!(
                request_id = %request_id,
                provider = %candidate.provider(),
                model = %candidate.model(),
                "stream opened"
            );
            Ok::<_, Error>(OrchestratedStream {
                request_id: request_id.clone(),
                provider: candidate.provider().to_string(),
                model: candidate.model().to_string(),
                strategy: decision.strategy,
                fallback_used: served.candidate_index > 0,
                attempted: served.attempted,
                stream: served.value,
            })
        };
        attempt.await.map_err(|e| e.with_request_id(&request_id))
    }
}

/// What the cached answer would have cost from the provider that produced it.
fn avoided_cost(request: &ChatRequest, entry: &CacheEntry, descriptor: &ProviderDescriptor) -> CostEstimate {
    let usage = entry.response.usage;
    let input = if usage.prompt_tokens > 0 {
        usage.prompt_tokens
    } else {
        counter_for(&entry.provider).count_messages(request.messages()) as u32
    };
    let output = if usage.completion_tokens > 0 {
        usage.completion_tokens
    } else {
        request.params().max_tokens.unwrap_or(DEFAULT_COMPLETION_ESTIMATE)
    };
    descriptor.pricing.calculate_cost(&entry.model, input, output)
}
