//! Load balancing and request dispatch
//!
//! Two pieces: [`LoadBalancer`] picks a candidate provider instance for a
//! logical model (weighted-random over every healthy binding, with an
//! optional explicit fallback-order override), and [`Dispatcher`] drives a
//! request through primary-then-fallback candidates with a per-candidate
//! retry loop, honoring a request's own `retry_count`/`timeout` hints where
//! present. The exponential backoff formula (`min(2^attempt, 10)` seconds)
//! and the split between a success log row and a failure log row are
//! carried over from the routing design this gateway distills.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use tracing::{info, warn};

use crate::core::health::HealthStore;
use crate::core::providers::{ChatStream, Provider};
use crate::core::types::chat::{ChatRequest, ChatResponse};
use crate::core::types::context::RequestContext;
use crate::utils::error::{GatewayError, Result};
use crate::utils::tokens;

/// Retry count used when a request carries no `retry_count` hint.
const DEFAULT_RETRIES_PER_PROVIDER: u32 = 2;
const MAX_BACKOFF_SECS: u64 = 10;

/// One provider instance's eligibility to serve a logical model.
#[derive(Debug, Clone)]
pub struct ModelBinding {
    pub provider_id: String,
    /// Lower values are tried first.
    pub priority: u32,
    /// Relative weight within a priority tier; ties broken uniformly when
    /// every candidate in the tier has weight zero.
    pub weight: u32,
}

/// Weighted-random candidate selection over a logical model's bindings,
/// filtered to instances the [`HealthStore`] currently considers healthy.
#[derive(Clone)]
pub struct LoadBalancer {
    bindings: Arc<HashMap<String, Vec<ModelBinding>>>,
    health: HealthStore,
}

impl LoadBalancer {
    pub fn new(bindings: HashMap<String, Vec<ModelBinding>>, health: HealthStore) -> Self {
        Self {
            bindings: Arc::new(bindings),
            health,
        }
    }

    /// All bindings for a model, sorted by priority ascending then weight
    /// descending, regardless of health — used for the fallback scan order
    /// and for diagnostics endpoints.
    pub fn ordered_bindings(&self, model: &str) -> Vec<ModelBinding> {
        let mut bindings = self.bindings.get(model).cloned().unwrap_or_default();
        bindings.sort_by(|a, b| a.priority.cmp(&b.priority).then(b.weight.cmp(&a.weight)));
        bindings
    }

    /// Every currently-healthy binding for a model, in priority/weight order.
    pub fn healthy_bindings(&self, model: &str) -> Vec<ModelBinding> {
        self.ordered_bindings(model)
            .into_iter()
            .filter(|b| self.health.is_healthy(&b.provider_id))
            .collect()
    }

    /// Select one provider instance for `model`.
    ///
    /// Weighted-random draw over every healthy candidate for the model,
    /// regardless of priority tier (priority only orders the fallback scan
    /// in [`Self::ordered_bindings`]). Falls back to a uniform pick if every
    /// healthy candidate has weight zero.
    pub fn select(&self, model: &str) -> Option<String> {
        let healthy = self.healthy_bindings(model);
        if healthy.is_empty() {
            return None;
        }
        if healthy.len() == 1 {
            return Some(healthy[0].provider_id.clone());
        }

        let total_weight: u32 = healthy.iter().map(|b| b.weight).sum();
        if total_weight == 0 {
            let idx = rand::thread_rng().gen_range(0..healthy.len());
            return Some(healthy[idx].provider_id.clone());
        }

        let mut roll = rand::thread_rng().gen_range(0..total_weight);
        for binding in &healthy {
            if roll < binding.weight {
                return Some(binding.provider_id.clone());
            }
            roll -= binding.weight;
        }
        healthy.last().map(|b| b.provider_id.clone())
    }
}

/// Source of a logical model's candidate bindings. Implemented by the
/// storage layer's config store view (30s-TTL cached over the database);
/// kept as a trait here so the dispatcher doesn't depend on a concrete
/// database, matching [`RequestLogSink`] below.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BindingSource: Send + Sync {
    async fn candidates(&self, model: &str) -> Result<Vec<ModelBinding>>;
}

/// Sink for the two terminal outcomes a dispatched request can have.
/// Implemented by the storage layer; kept as a trait here so the dispatcher
/// doesn't depend on a concrete database.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestLogSink: Send + Sync {
    async fn log_success(&self, ctx: &RequestContext, response: &ChatResponse, provider_id: &str, latency_ms: u64);
    async fn log_streaming_success(
        &self,
        ctx: &RequestContext,
        provider_id: &str,
        model: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
        latency_ms: u64,
    );
    async fn log_failure(&self, ctx: &RequestContext, model: &str, error: &GatewayError, latency_ms: u64);
}

/// Drives a canonical chat request through primary-then-fallback provider
/// candidates, retrying transient failures within each candidate before
/// moving to the next.
///
/// Candidate bindings are pulled fresh from a [`BindingSource`] on every
/// call rather than snapshotted once at startup, so a binding or provider
/// added at runtime is picked up within the source's own cache TTL (30s for
/// the config store view) without a restart.
pub struct Dispatcher {
    registry: HashMap<String, Provider>,
    binding_source: Arc<dyn BindingSource>,
    health: HealthStore,
    log_sink: Arc<dyn RequestLogSink>,
}

impl Dispatcher {
    pub fn new(
        registry: HashMap<String, Provider>,
        binding_source: Arc<dyn BindingSource>,
        health: HealthStore,
        log_sink: Arc<dyn RequestLogSink>,
    ) -> Self {
        Self { registry, binding_source, health, log_sink }
    }

    async fn candidate_order(&self, request: &ChatRequest) -> Result<Vec<String>> {
        if !request.fallback_providers.is_empty() {
            return Ok(request.fallback_providers.clone());
        }
        if let Some(provider) = &request.provider {
            return Ok(vec![provider.clone()]);
        }

        let candidates = self.binding_source.candidates(&request.model).await?;
        let mut bindings = HashMap::new();
        bindings.insert(request.model.clone(), candidates);
        let balancer = LoadBalancer::new(bindings, self.health.clone());

        let mut order = Vec::new();
        if let Some(primary) = balancer.select(&request.model) {
            order.push(primary);
        }
        for binding in balancer.ordered_bindings(&request.model) {
            if !order.contains(&binding.provider_id) {
                order.push(binding.provider_id);
            }
        }
        Ok(order)
    }

    async fn backoff(attempt: u32) {
        let secs = 2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS);
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    /// Attempt `request` against one provider instance, retrying transient
    /// errors up to the request's `retry_count` hint, or
    /// [`DEFAULT_RETRIES_PER_PROVIDER`] when the request doesn't specify one.
    async fn try_provider(&self, provider_id: &str, request: &ChatRequest) -> Result<ChatResponse> {
        let provider = self
            .registry
            .get(provider_id)
            .ok_or_else(|| GatewayError::ProviderNotFound(provider_id.to_string()))?;
        let retries = request.retry_count.unwrap_or(DEFAULT_RETRIES_PER_PROVIDER);
        let timeout = request.timeout.map(Duration::from_secs);

        let mut last_err = None;
        for attempt in 0..=retries {
            if attempt > 0 {
                Self::backoff(attempt - 1).await;
            }
            match provider.chat(request, timeout).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < retries => {
                    warn!(provider_id, attempt, error = %e, "retrying after transient error");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| GatewayError::upstream_transient(provider_id, "exhausted retries")))
    }

    /// Route a non-streaming chat request to completion.
    pub async fn route(&self, request: ChatRequest, ctx: RequestContext) -> Result<ChatResponse> {
        let start = Instant::now();
        let candidates = match self.candidate_order(&request).await {
            Ok(c) => c,
            Err(e) => {
                self.log_sink.log_failure(&ctx, &request.model, &e, elapsed_ms(start)).await;
                return Err(e);
            }
        };
        if candidates.is_empty() {
            let err = GatewayError::NoProvider(request.model.clone());
            self.log_sink.log_failure(&ctx, &request.model, &err, elapsed_ms(start)).await;
            return Err(err);
        }

        let mut last_err = None;
        for provider_id in &candidates {
            match self.try_provider(provider_id, &request).await {
                Ok(mut response) => {
                    response.latency_ms = elapsed_ms(start);
                    self.log_sink.log_success(&ctx, &response, provider_id, response.latency_ms).await;
                    return Ok(response);
                }
                Err(e) => {
                    info!(provider_id, error = %e, "provider attempt failed, trying next candidate");
                    last_err = Some(e);
                }
            }
        }

        let err = last_err.unwrap_or_else(|| GatewayError::NoProvider(request.model.clone()));
        self.log_sink.log_failure(&ctx, &request.model, &err, elapsed_ms(start)).await;
        Err(err)
    }

    /// Route a streaming chat request. Logging of the terminal outcome is
    /// the caller's responsibility once the stream's accountant finalizes,
    /// since usage is only known after the stream completes.
    pub async fn route_streaming(&self, request: &ChatRequest) -> Result<(String, ChatStream)> {
        let candidates = self.candidate_order(request).await?;
        if candidates.is_empty() {
            return Err(GatewayError::NoProvider(request.model.clone()));
        }

        let timeout = request.timeout.map(Duration::from_secs);
        let mut last_err = None;
        for provider_id in &candidates {
            let provider = match self.registry.get(provider_id) {
                Some(p) => p,
                None => continue,
            };
            match provider.chat_stream(request, timeout).await {
                Ok(stream) => return Ok((provider_id.clone(), stream)),
                Err(e) => {
                    info!(provider_id, error = %e, "streaming attempt failed, trying next candidate");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| GatewayError::NoProvider(request.model.clone())))
    }

    pub fn log_sink(&self) -> Arc<dyn RequestLogSink> {
        self.log_sink.clone()
    }

    pub fn estimate_input_tokens(&self, request: &ChatRequest) -> u32 {
        tokens::estimate_input_tokens(request)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> HashMap<String, Vec<ModelBinding>> {
        let mut m = HashMap::new();
        m.insert(
            "gpt-4o".to_string(),
            vec![
                ModelBinding { provider_id: "p1".into(), priority: 0, weight: 1 },
                ModelBinding { provider_id: "p2".into(), priority: 0, weight: 1 },
                ModelBinding { provider_id: "p3".into(), priority: 1, weight: 1 },
            ],
        );
        m
    }

    #[test]
    fn selects_among_all_healthy_candidates_regardless_of_priority() {
        let health = HealthStore::new(5);
        let lb = LoadBalancer::new(bindings(), health);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(lb.select("gpt-4o").unwrap());
        }
        assert_eq!(seen, ["p1", "p2", "p3"].into_iter().map(String::from).collect());
    }

    #[test]
    fn excludes_unhealthy_candidates() {
        let health = HealthStore::new(1);
        health.record_failure("p1", "down");
        health.record_failure("p2", "down");
        let lb = LoadBalancer::new(bindings(), health);
        assert_eq!(lb.select("gpt-4o"), Some("p3".to_string()));
    }

    #[test]
    fn heavily_weighted_candidate_dominates_selection_across_tiers() {
        let mut m = HashMap::new();
        m.insert(
            "m".to_string(),
            vec![
                ModelBinding { provider_id: "low".into(), priority: 1, weight: 1000 },
                ModelBinding { provider_id: "high".into(), priority: 0, weight: 1 },
            ],
        );
        let lb = LoadBalancer::new(m, HealthStore::new(5));
        let mut low_tier_wins = 0;
        for _ in 0..200 {
            if lb.select("m").unwrap() == "low" {
                low_tier_wins += 1;
            }
        }
        assert!(low_tier_wins > 150, "expected the heavily-weighted lower-priority candidate to dominate, got {low_tier_wins}/200");
    }

    #[test]
    fn unknown_model_selects_nothing() {
        let health = HealthStore::new(5);
        let lb = LoadBalancer::new(bindings(), health);
        assert_eq!(lb.select("no-such-model"), None);
    }

    #[test]
    fn zero_weight_tier_falls_back_to_uniform_pick() {
        let mut m = HashMap::new();
        m.insert(
            "m".to_string(),
            vec![
                ModelBinding { provider_id: "a".into(), priority: 0, weight: 0 },
                ModelBinding { provider_id: "b".into(), priority: 0, weight: 0 },
            ],
        );
        let lb = LoadBalancer::new(m, HealthStore::new(5));
        let pick = lb.select("m").unwrap();
        assert!(pick == "a" || pick == "b");
    }

    use crate::core::providers::openai::OpenAiProvider;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ok_body() -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "ok"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        })
    }

    #[tokio::test]
    async fn routes_to_the_only_healthy_candidate_and_logs_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .mount(&server)
            .await;

        let mut registry = HashMap::new();
        registry.insert(
            "p1".to_string(),
            Provider::OpenAi(OpenAiProvider::new(server.uri(), "sk-test".to_string()).unwrap()),
        );

        let mut binding_source = MockBindingSource::new();
        binding_source
            .expect_candidates()
            .returning(|_| Ok(vec![ModelBinding { provider_id: "p1".into(), priority: 0, weight: 1 }]));

        let mut log_sink = MockRequestLogSink::new();
        log_sink.expect_log_success().times(1).returning(|_, _, _, _| ());
        log_sink.expect_log_failure().times(0).returning(|_, _, _, _| ());

        let dispatcher = Dispatcher::new(registry, Arc::new(binding_source), HealthStore::new(5), Arc::new(log_sink));

        let request = ChatRequest::new("gpt-4o").add_user_message("hi");
        let response = dispatcher.route(request, RequestContext::new()).await.unwrap();

        assert_eq!(response.provider, "openai");
        assert_eq!(response.choices[0].message.text_content(), "ok");
    }

    #[tokio::test]
    async fn no_candidate_bindings_logs_failure_without_calling_upstream() {
        let mut binding_source = MockBindingSource::new();
        binding_source.expect_candidates().returning(|_| Ok(Vec::new()));

        let mut log_sink = MockRequestLogSink::new();
        log_sink
            .expect_log_failure()
            .times(1)
            .withf(|_, model, err, _| model == "gpt-4o" && matches!(err, GatewayError::NoProvider(_)))
            .returning(|_, _, _, _| ());

        let registry = HashMap::new();
        let dispatcher = Dispatcher::new(registry, Arc::new(binding_source), HealthStore::new(5), Arc::new(log_sink));

        let request = ChatRequest::new("gpt-4o").add_user_message("hi");
        let err = dispatcher.route(request, RequestContext::new()).await.unwrap_err();

        assert!(matches!(err, GatewayError::NoProvider(_)));
    }
}
