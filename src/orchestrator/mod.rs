//! Multi-model orchestration core
//!
//! For each turn: append the user message, snapshot control parameters and
//! context, fan out to every registered model client concurrently with
//! independent timeouts, absorb per-call failures into failed
//! ModelResponses, aggregate into a Decision, and record turn metrics.
//! Total failure of every client is the one fatal path.

use crate::config::{DispatchConfig, EngineConfig};
use crate::context::{ContextManager, Message, MessageRole};
use crate::control::ControlStore;
use crate::error::{EngineError, Result};
use crate::metrics::{MetricsSnapshot, TurnMetrics, ENGINE_METRICS};
use crate::providers::{build_clients, GenerateOutput, GenerateRequest, ModelClient, ProviderError};
use crate::store::{Decision, DecisionStore, ModelResponse};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DECISION_TYPE_AGGREGATE: &str = "multi_model_aggregate";

/// Everything one successful turn produced
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub decision: Decision,
    pub responses: Vec<ModelResponse>,
    /// Highest-confidence response, exposed to the caller and appended to
    /// the context as the assistant message
    pub answer: ModelResponse,
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub uptime_seconds: i64,
    pub registered_models: Vec<String>,
    pub context_count: usize,
    pub decision_count: usize,
    pub metrics: MetricsSnapshot,
    pub timestamp: DateTime<Utc>,
}

pub struct MultiModelOrchestrator {
    clients: Vec<Arc<dyn ModelClient>>,
    contexts: Arc<ContextManager>,
    control: Arc<ControlStore>,
    store: Arc<DecisionStore>,
    metrics: Arc<TurnMetrics>,
    dispatch: DispatchConfig,
    deployed_at: DateTime<Utc>,
}

impl MultiModelOrchestrator {
    /// Create an orchestrator with pre-built clients, preserving their
    /// registration order for tie-breaking.
    pub fn new(config: EngineConfig, clients: Vec<Arc<dyn ModelClient>>) -> Self {
        Self {
            clients,
            contexts: Arc::new(ContextManager::new(config.context)),
            control: Arc::new(ControlStore::new(config.control)),
            store: Arc::new(DecisionStore::new()),
            metrics: Arc::new(TurnMetrics::new(config.metrics)),
            dispatch: config.dispatch,
            deployed_at: Utc::now(),
        }
    }

    /// Create an orchestrator with clients built from the `[providers]`
    /// configuration section.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let clients = build_clients(&config.providers)?;
        Ok(Self::new(config, clients))
    }

    pub fn contexts(&self) -> &ContextManager {
        &self.contexts
    }

    pub fn control(&self) -> &ControlStore {
        &self.control
    }

    pub fn store(&self) -> &DecisionStore {
        &self.store
    }

    pub fn metrics(&self) -> &TurnMetrics {
        &self.metrics
    }

    /// Run one orchestrated turn for a context.
    pub async fn ask(&self, context_id: Uuid, user_text: &str) -> Result<TurnOutcome> {
        if self.clients.is_empty() {
            return Err(EngineError::Configuration(
                "no model clients registered".to_string(),
            ));
        }

        let start = Instant::now();

        // 1. Append the user turn, then snapshot control and context. The
        //    snapshot reflects any truncation the append triggered.
        self.contexts
            .append(context_id, Message::user(user_text))?;
        let params = self.control.snapshot(context_id);
        let mut history = self.contexts.snapshot(context_id)?;

        // The prompt travels separately; drop the user turn we just appended
        // so clients do not see it twice.
        if history
            .last()
            .map(|m| m.role == MessageRole::User)
            .unwrap_or(false)
        {
            history.pop();
        }

        let request = GenerateRequest {
            prompt: user_text.to_string(),
            history,
            params,
            max_tokens: self.dispatch.max_response_tokens,
            timeout: self.dispatch.per_call_timeout(),
        };

        debug!(
            "Dispatching turn on context {} to {} clients (temperature={}, top_p={})",
            context_id,
            self.clients.len(),
            params.temperature,
            params.top_p
        );

        // 2-3. Fan out concurrently; each call is bounded by its own timeout
        //      and its failure never aborts siblings.
        let settled = self.dispatch_all(&request).await;

        let succeeded = settled.iter().filter(|(_, r)| r.is_ok()).count();

        // 4. Total failure is fatal for this turn; nothing is persisted.
        if succeeded == 0 {
            let elapsed = start.elapsed();
            self.metrics.record(elapsed.as_secs_f64() * 1000.0, false);
            ENGINE_METRICS.record_turn(false, elapsed.as_secs_f64());
            error!(
                "All {} providers failed for context {}",
                self.clients.len(),
                context_id
            );
            return Err(EngineError::AllProvidersFailed {
                attempted: self.clients.len(),
            });
        }

        // 5. Aggregate: one Decision, one ModelResponse per call, highest
        //    confidence wins (ties broken by registration order).
        let elapsed = start.elapsed();
        let mut metadata: HashMap<String, serde_json::Value> = HashMap::new();
        metadata.insert("models_dispatched".into(), self.clients.len().into());
        metadata.insert("models_succeeded".into(), succeeded.into());
        metadata.insert(
            "latency_ms".into(),
            serde_json::json!(elapsed.as_secs_f64() * 1000.0),
        );

        let decision = Decision::new(context_id, DECISION_TYPE_AGGREGATE, metadata);

        // Selection keys off the settled call outcomes, not the response
        // shape: a call that completed with empty text and confidence 0.0 is
        // still a completed call and stays eligible as representative.
        let mut responses: Vec<ModelResponse> = Vec::with_capacity(settled.len());
        let mut completed: Vec<bool> = Vec::with_capacity(settled.len());
        for (name, result) in settled {
            match result {
                Ok(output) => {
                    responses.push(ModelResponse::new(
                        decision.id,
                        name,
                        output.text,
                        output.confidence,
                    ));
                    completed.push(true);
                }
                Err(e) => {
                    warn!("Provider {} failed, recording failed response: {}", name, e);
                    responses.push(ModelResponse::failed(decision.id, name));
                    completed.push(false);
                }
            }
        }

        let answer = responses
            .iter()
            .zip(&completed)
            .filter(|(_, done)| **done)
            .map(|(response, _)| response)
            .fold(None::<&ModelResponse>, |best, candidate| match best {
                Some(b) if candidate.confidence > b.confidence => Some(candidate),
                Some(b) => Some(b),
                None => Some(candidate),
            })
            .cloned()
            .ok_or_else(|| EngineError::Internal("no completed response to select".to_string()))?;

        self.store.insert_decision(decision.clone(), responses.clone());

        self.contexts
            .append(context_id, Message::assistant(answer.response_text.clone()))?;

        self.metrics.record(elapsed.as_secs_f64() * 1000.0, true);
        ENGINE_METRICS.record_turn(true, elapsed.as_secs_f64());

        info!(
            "Turn on context {} complete: {}/{} providers succeeded, answer from {} ({:.0}ms)",
            context_id,
            succeeded,
            responses.len(),
            answer.model_name,
            elapsed.as_secs_f64() * 1000.0
        );

        Ok(TurnOutcome {
            decision,
            responses,
            answer,
        })
    }

    /// Dispatch one call per client concurrently. Each call is wrapped in an
    /// independent timeout; a timeout cancels only that call's future. A
    /// client carrying its own timeout bound replaces the engine-wide one.
    async fn dispatch_all(
        &self,
        request: &GenerateRequest,
    ) -> Vec<(String, std::result::Result<GenerateOutput, ProviderError>)> {
        let calls = self.clients.iter().map(|client| {
            let client = Arc::clone(client);
            let mut request = request.clone();
            if let Some(bound) = client.timeout_override() {
                request.timeout = bound;
            }
            async move {
                let name = client.name().to_string();
                let result =
                    match tokio::time::timeout(request.timeout, client.generate(&request)).await {
                        Ok(inner) => inner,
                        Err(_) => Err(ProviderError::Timeout(format!(
                            "call exceeded {}ms bound",
                            request.timeout.as_millis()
                        ))),
                    };
                ENGINE_METRICS.record_provider_call(&name, result.is_ok());
                (name, result)
            }
        });

        join_all(calls).await
    }

    /// Aggregate health view: uptime, registered models, and turn metrics.
    pub fn health_report(&self) -> HealthReport {
        HealthReport {
            status: "healthy",
            uptime_seconds: (Utc::now() - self.deployed_at).num_seconds(),
            registered_models: self.clients.iter().map(|c| c.name().to_string()).collect(),
            context_count: self.contexts.list().len(),
            decision_count: self.store.decision_count(),
            metrics: self.metrics.snapshot(),
            timestamp: Utc::now(),
        }
    }
}
