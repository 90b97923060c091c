//! Persistence for decisions, model responses, and human feedback
//!
//! Logical layout mirrors the four persisted collections: contexts live in
//! the context manager; decisions and model responses are immutable after
//! insertion; feedback is append-only. Storage here is an in-memory keyed
//! store; all cross-entity references are by identifier.

pub mod models;

pub use models::{Decision, HumanFeedback, ModelResponse};

use crate::error::{EngineError, Result};
use crate::metrics::ENGINE_METRICS;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

pub struct DecisionStore {
    decisions: DashMap<Uuid, Decision>,
    responses: DashMap<Uuid, Vec<ModelResponse>>,
    feedback: DashMap<Uuid, Vec<HumanFeedback>>,
}

impl DecisionStore {
    pub fn new() -> Self {
        Self {
            decisions: DashMap::new(),
            responses: DashMap::new(),
            feedback: DashMap::new(),
        }
    }

    /// Persist a decision together with all of its model responses. Called
    /// exactly once per successful turn.
    pub fn insert_decision(&self, decision: Decision, responses: Vec<ModelResponse>) {
        debug!(
            "Persisting decision {} with {} responses",
            decision.id,
            responses.len()
        );
        self.responses.insert(decision.id, responses);
        self.decisions.insert(decision.id, decision);
    }

    pub fn decision(&self, decision_id: Uuid) -> Result<Decision> {
        self.decisions
            .get(&decision_id)
            .map(|d| d.clone())
            .ok_or_else(|| EngineError::NotFound(format!("decision {}", decision_id)))
    }

    pub fn responses_for(&self, decision_id: Uuid) -> Result<Vec<ModelResponse>> {
        // A decision with no responses cannot exist; missing means unknown id
        self.responses
            .get(&decision_id)
            .map(|r| r.clone())
            .ok_or_else(|| EngineError::NotFound(format!("decision {}", decision_id)))
    }

    /// All decisions recorded for one context, oldest first
    pub fn decisions_for_context(&self, context_id: Uuid) -> Vec<Decision> {
        let mut decisions: Vec<Decision> = self
            .decisions
            .iter()
            .filter(|d| d.context_id == context_id)
            .map(|d| d.clone())
            .collect();
        decisions.sort_by_key(|d| d.created_at);
        decisions
    }

    /// Record feedback against an existing decision. Fails with `NotFound`
    /// and leaves the store unchanged if the decision does not exist.
    pub fn record_feedback(
        &self,
        decision_id: Uuid,
        text: impl Into<String>,
        rating: u8,
    ) -> Result<HumanFeedback> {
        if !self.decisions.contains_key(&decision_id) {
            return Err(EngineError::NotFound(format!("decision {}", decision_id)));
        }

        let entry = HumanFeedback::new(decision_id, text, rating);
        self.feedback
            .entry(decision_id)
            .or_default()
            .push(entry.clone());
        ENGINE_METRICS.feedback_recorded.inc();

        debug!(
            "Recorded feedback {} (rating {}) for decision {}",
            entry.id, entry.rating, decision_id
        );

        Ok(entry)
    }

    pub fn feedback_for(&self, decision_id: Uuid) -> Vec<HumanFeedback> {
        self.feedback
            .get(&decision_id)
            .map(|f| f.clone())
            .unwrap_or_default()
    }

    pub fn decision_count(&self) -> usize {
        self.decisions.len()
    }

    pub fn feedback_count(&self) -> usize {
        self.feedback.iter().map(|f| f.len()).sum()
    }
}

impl Default for DecisionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn stored_decision(store: &DecisionStore) -> Decision {
        let decision = Decision::new(Uuid::new_v4(), "multi_model_aggregate", HashMap::new());
        let responses = vec![ModelResponse::new(decision.id, "model-a", "answer", 0.8)];
        store.insert_decision(decision.clone(), responses);
        decision
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = DecisionStore::new();
        let decision = stored_decision(&store);

        assert_eq!(store.decision(decision.id).unwrap().id, decision.id);
        assert_eq!(store.responses_for(decision.id).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_decision_is_not_found() {
        let store = DecisionStore::new();
        let err = store.decision(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_feedback_roundtrip() {
        let store = DecisionStore::new();
        let decision = stored_decision(&store);

        store.record_feedback(decision.id, "useful", 4).unwrap();
        store.record_feedback(decision.id, "still useful", 5).unwrap();

        let feedback = store.feedback_for(decision.id);
        assert_eq!(feedback.len(), 2);
        assert_eq!(feedback[0].rating, 4);
    }

    #[test]
    fn test_feedback_against_missing_decision() {
        let store = DecisionStore::new();
        let err = store
            .record_feedback(Uuid::new_v4(), "orphan", 3)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(store.feedback_count(), 0);
    }

    #[test]
    fn test_decisions_for_context_ordering() {
        let store = DecisionStore::new();
        let context_id = Uuid::new_v4();

        for _ in 0..3 {
            let decision = Decision::new(context_id, "multi_model_aggregate", HashMap::new());
            let responses = vec![ModelResponse::new(decision.id, "m", "t", 0.5)];
            store.insert_decision(decision, responses);
        }

        let decisions = store.decisions_for_context(context_id);
        assert_eq!(decisions.len(), 3);
        assert!(decisions.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }
}
