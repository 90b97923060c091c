//! End-to-end orchestration tests
//!
//! These tests drive the full turn pipeline through the public API with
//! scripted model clients: dispatch, aggregation, context growth, control
//! parameter propagation, feedback, and metrics.

use async_trait::async_trait;
use orquesta::prelude::*;
use orquesta::providers::ProviderError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Client that replays a fixed outcome and records every request it sees
struct RecordingClient {
    name: String,
    confidence: f32,
    fail: bool,
    delay: Option<Duration>,
    seen: Mutex<Vec<GenerateRequest>>,
}

impl RecordingClient {
    fn ok(name: &str, confidence: f32) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            confidence,
            fail: false,
            delay: None,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            confidence: 0.0,
            fail: true,
            delay: None,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn slow(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            confidence: 0.9,
            fail: false,
            delay: Some(delay),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn last_request(&self) -> GenerateRequest {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ModelClient for RecordingClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateOutput, ProviderError> {
        self.seen.lock().unwrap().push(req.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ProviderError::Request("scripted failure".to_string()));
        }
        Ok(GenerateOutput {
            text: format!("answer from {}", self.name),
            confidence: self.confidence,
        })
    }
}

fn orchestrator_with(clients: Vec<Arc<RecordingClient>>) -> MultiModelOrchestrator {
    let mut config = EngineConfig::default();
    config.dispatch.per_call_timeout_ms = 100;
    let clients: Vec<Arc<dyn ModelClient>> = clients
        .into_iter()
        .map(|c| c as Arc<dyn ModelClient>)
        .collect();
    MultiModelOrchestrator::new(config, clients)
}

#[tokio::test]
async fn test_full_turn_pipeline() {
    let strong = RecordingClient::ok("strong-model", 0.9);
    let weak = RecordingClient::ok("weak-model", 0.4);
    let orchestrator = orchestrator_with(vec![Arc::clone(&strong), Arc::clone(&weak)]);

    let ctx = orchestrator.contexts().create("pipeline");
    let outcome = orchestrator.ask(ctx, "what is the plan?").await.unwrap();

    assert_eq!(outcome.answer.model_name, "strong-model");
    assert_eq!(outcome.responses.len(), 2);
    assert!(outcome.responses.iter().all(|r| !r.is_failed()));

    // Both persisted entities are retrievable by id
    let decision = orchestrator.store().decision(outcome.decision.id).unwrap();
    assert_eq!(decision.context_id, ctx);
    assert_eq!(
        orchestrator.store().responses_for(decision.id).unwrap().len(),
        2
    );

    // The context now holds the user turn and the winning answer
    let history = orchestrator.contexts().snapshot(ctx).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, "answer from strong-model");
}

#[tokio::test]
async fn test_control_updates_propagate_to_clients() {
    let client = RecordingClient::ok("tuned-model", 0.8);
    let orchestrator = orchestrator_with(vec![Arc::clone(&client)]);
    let ctx = orchestrator.contexts().create("tuning");

    orchestrator.control().update(ctx, Some(1.4), Some(0.2)).unwrap();
    orchestrator.ask(ctx, "hello").await.unwrap();

    let req = client.last_request();
    assert!((req.params.temperature - 1.4).abs() < f32::EPSILON);
    assert!((req.params.top_p - 0.2).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_out_of_range_control_values_are_clamped() {
    let client = RecordingClient::ok("clamped-model", 0.8);
    let orchestrator = orchestrator_with(vec![Arc::clone(&client)]);
    let ctx = orchestrator.contexts().create("clamping");

    orchestrator.control().update(ctx, Some(9.0), Some(-0.5)).unwrap();
    orchestrator.ask(ctx, "hello").await.unwrap();

    let req = client.last_request();
    assert!((req.params.temperature - 2.0).abs() < f32::EPSILON);
    assert!(req.params.top_p.abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_history_grows_across_turns() {
    let client = RecordingClient::ok("history-model", 0.8);
    let orchestrator = orchestrator_with(vec![Arc::clone(&client)]);
    let ctx = orchestrator.contexts().create("history");

    orchestrator.ask(ctx, "first").await.unwrap();
    orchestrator.ask(ctx, "second").await.unwrap();

    // The second request carried the first exchange as history; the new
    // prompt travels in the prompt field, not the history.
    let req = client.last_request();
    assert_eq!(req.prompt, "second");
    assert_eq!(req.history.len(), 2);
    assert_eq!(req.history[0].content, "first");
    assert_eq!(req.history[1].content, "answer from history-model");
}

#[tokio::test]
async fn test_slow_provider_recorded_as_failed() {
    let fast = RecordingClient::ok("fast-model", 0.6);
    let slow = RecordingClient::slow("slow-model", Duration::from_secs(5));
    let orchestrator = orchestrator_with(vec![fast, slow]);
    let ctx = orchestrator.contexts().create("timeouts");

    let outcome = orchestrator.ask(ctx, "question").await.unwrap();

    assert_eq!(outcome.answer.model_name, "fast-model");
    let failed: Vec<_> = outcome.responses.iter().filter(|r| r.is_failed()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].model_name, "slow-model");
}

#[tokio::test]
async fn test_all_failed_leaves_no_trace() {
    let orchestrator = orchestrator_with(vec![
        RecordingClient::failing("broken-a"),
        RecordingClient::failing("broken-b"),
    ]);
    let ctx = orchestrator.contexts().create("doomed");

    let err = orchestrator.ask(ctx, "question").await.unwrap_err();
    assert!(matches!(err, EngineError::AllProvidersFailed { attempted: 2 }));
    assert_eq!(orchestrator.store().decision_count(), 0);
    assert!(orchestrator.store().decisions_for_context(ctx).is_empty());

    // The turn still counts against the success rate
    let snap = orchestrator.metrics().snapshot();
    assert_eq!(snap.count, 1);
    assert!(snap.success_rate < 1e-9);
}

#[tokio::test]
async fn test_feedback_on_turn_decision() {
    let orchestrator = orchestrator_with(vec![RecordingClient::ok("model", 0.7)]);
    let ctx = orchestrator.contexts().create("feedback");

    let outcome = orchestrator.ask(ctx, "question").await.unwrap();
    let entry = orchestrator
        .store()
        .record_feedback(outcome.decision.id, "good answer", 4)
        .unwrap();

    assert_eq!(entry.rating, 4);
    assert_eq!(orchestrator.store().feedback_for(outcome.decision.id).len(), 1);
}

#[tokio::test]
async fn test_concurrent_turns_on_distinct_contexts() {
    let orchestrator = Arc::new(orchestrator_with(vec![RecordingClient::ok("model", 0.7)]));

    let mut handles = Vec::new();
    for i in 0..8 {
        let orchestrator = Arc::clone(&orchestrator);
        handles.push(tokio::spawn(async move {
            let ctx = orchestrator.contexts().create(format!("ctx-{}", i));
            let outcome = orchestrator.ask(ctx, "question").await.unwrap();
            (ctx, outcome)
        }));
    }

    for handle in handles {
        let (ctx, outcome) = handle.await.unwrap();
        // Each turn landed on its own context
        assert_eq!(outcome.decision.context_id, ctx);
        assert_eq!(orchestrator.contexts().snapshot(ctx).unwrap().len(), 2);
    }

    assert_eq!(orchestrator.store().decision_count(), 8);
    assert_eq!(orchestrator.metrics().snapshot().count, 8);
}

#[tokio::test]
async fn test_context_lifecycle() {
    let orchestrator = orchestrator_with(vec![RecordingClient::ok("model", 0.7)]);

    let kept = orchestrator.contexts().create("kept");
    let dropped = orchestrator.contexts().create("dropped");
    assert_eq!(orchestrator.contexts().list().len(), 2);

    orchestrator.ask(kept, "question").await.unwrap();
    orchestrator.contexts().clear(kept).unwrap();
    assert!(orchestrator.contexts().snapshot(kept).unwrap().is_empty());

    orchestrator.contexts().delete(dropped).unwrap();
    assert_eq!(orchestrator.contexts().list().len(), 1);

    let err = orchestrator.ask(dropped, "question").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn test_health_report_after_turns() {
    let orchestrator = orchestrator_with(vec![RecordingClient::ok("model-a", 0.7)]);
    let ctx = orchestrator.contexts().create("health");
    orchestrator.ask(ctx, "one").await.unwrap();
    orchestrator.ask(ctx, "two").await.unwrap();

    let report = orchestrator.health_report();
    assert_eq!(report.status, "healthy");
    assert!(report.uptime_seconds >= 0);
    assert_eq!(report.registered_models, vec!["model-a".to_string()]);
    assert_eq!(report.context_count, 1);
    assert_eq!(report.decision_count, 2);
    assert_eq!(report.metrics.count, 2);
}
