//! Data models for decisions, model responses, and human feedback

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The persisted record of one orchestrated turn's outcome. Immutable after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: Uuid,
    pub context_id: Uuid,
    pub decision_type: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Decision {
    pub fn new(
        context_id: Uuid,
        decision_type: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            context_id,
            decision_type: decision_type.into(),
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// One provider's answer contributing to a Decision. A failed call is
/// recorded with empty text and confidence 0.0. Never mutated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub id: Uuid,
    pub decision_id: Uuid,
    pub model_name: String,
    pub response_text: String,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
}

impl ModelResponse {
    pub fn new(
        decision_id: Uuid,
        model_name: impl Into<String>,
        response_text: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            decision_id,
            model_name: model_name.into(),
            response_text: response_text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            created_at: Utc::now(),
        }
    }

    /// Record for a call that timed out or errored
    pub fn failed(decision_id: Uuid, model_name: impl Into<String>) -> Self {
        Self::new(decision_id, model_name, "", 0.0)
    }

    /// Whether this response has the failed-call sentinel shape (empty
    /// text, zero confidence). Turn-internal selection tracks call
    /// outcomes directly and does not rely on this.
    pub fn is_failed(&self) -> bool {
        self.response_text.is_empty() && self.confidence == 0.0
    }
}

/// Human feedback recorded against a Decision. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanFeedback {
    pub id: Uuid,
    pub decision_id: Uuid,
    pub feedback_text: String,
    pub rating: u8,
    pub created_at: DateTime<Utc>,
}

impl HumanFeedback {
    pub fn new(decision_id: Uuid, feedback_text: impl Into<String>, rating: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            decision_id,
            feedback_text: feedback_text.into(),
            rating: rating.clamp(1, 5),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_clamped() {
        let response = ModelResponse::new(Uuid::new_v4(), "m", "text", 1.5);
        assert_eq!(response.confidence, 1.0);
    }

    #[test]
    fn test_failed_response_shape() {
        let response = ModelResponse::failed(Uuid::new_v4(), "m");
        assert!(response.is_failed());
        assert!(response.response_text.is_empty());
        assert_eq!(response.confidence, 0.0);
    }

    #[test]
    fn test_rating_clamped() {
        let feedback = HumanFeedback::new(Uuid::new_v4(), "great", 9);
        assert_eq!(feedback.rating, 5);
        let feedback = HumanFeedback::new(Uuid::new_v4(), "bad", 0);
        assert_eq!(feedback.rating, 1);
    }
}
