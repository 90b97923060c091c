//! Context manager with token budget enforcement and corruption recovery

use super::models::{ContextSummary, Message, MessageRole};
use super::token_estimator::{default_estimator, TokenEstimator};
use crate::config::{ContextConfig, EvictionPolicy};
use crate::error::{EngineError, Result};
use crate::metrics::ENGINE_METRICS;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// One stored conversation. The message history is kept as a serialized JSON
/// log, mirroring the persisted row a storage backend would hold, so that a
/// log that fails to parse can be detected and recovered.
struct ContextRecord {
    name: String,
    raw_log: String,
    token_estimate: usize,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl ContextRecord {
    fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            name,
            raw_log: "[]".to_string(),
            token_estimate: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Owns all conversation histories. Mutation for one context is serialized
/// through its map entry; different contexts proceed in parallel.
pub struct ContextManager {
    config: ContextConfig,
    estimator: Arc<dyn TokenEstimator>,
    contexts: DashMap<Uuid, ContextRecord>,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self::with_estimator(config, default_estimator())
    }

    pub fn with_estimator(config: ContextConfig, estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            config,
            estimator,
            contexts: DashMap::new(),
        }
    }

    /// Create a new empty context and return its identifier
    pub fn create(&self, name: impl Into<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.contexts.insert(id, ContextRecord::new(name.into()));
        debug!("Created context {}", id);
        id
    }

    /// Append a message, then evict non-system messages until the token
    /// estimate is back under the configured ceiling. Truncation is never an
    /// error; a corrupted log is recovered to empty before the append.
    pub fn append(&self, context_id: Uuid, message: Message) -> Result<()> {
        let mut record = self
            .contexts
            .get_mut(&context_id)
            .ok_or_else(|| EngineError::NotFound(format!("context {}", context_id)))?;

        let mut messages = Self::parse_or_recover(context_id, &record.raw_log);
        messages.push(message);

        let mut total: usize = messages
            .iter()
            .map(|m| self.estimator.estimate(&m.content))
            .sum();

        while total > self.config.max_context_tokens {
            match self.evict_one(&mut messages) {
                Some(evicted) => {
                    total -= self.estimator.estimate(&evicted.content);
                    ENGINE_METRICS.context_truncations.inc();
                    debug!(
                        "Context {} over budget, evicted {} message ({} tokens remaining)",
                        context_id,
                        evicted.role.as_str(),
                        total
                    );
                }
                // Only system messages remain; the budget cannot shrink further
                None => break,
            }
        }

        record.raw_log = serde_json::to_string(&messages)
            .map_err(|e| EngineError::Internal(format!("failed to serialize context log: {}", e)))?;
        record.token_estimate = total;
        record.updated_at = Utc::now();

        Ok(())
    }

    /// Return the ordered message history. An empty context yields an empty
    /// sequence; a corrupted log is reset to empty and the reset persisted.
    pub fn snapshot(&self, context_id: Uuid) -> Result<Vec<Message>> {
        let mut record = self
            .contexts
            .get_mut(&context_id)
            .ok_or_else(|| EngineError::NotFound(format!("context {}", context_id)))?;

        match serde_json::from_str::<Vec<Message>>(&record.raw_log) {
            Ok(messages) => Ok(messages),
            Err(e) => {
                let corruption = EngineError::ContextCorrupted(e.to_string());
                warn!(
                    "Context {}: {}; recovering to empty history",
                    context_id, corruption
                );
                ENGINE_METRICS.context_recoveries.inc();
                record.raw_log = "[]".to_string();
                record.token_estimate = 0;
                record.updated_at = Utc::now();
                Ok(Vec::new())
            }
        }
    }

    /// Current token estimate for a context
    pub fn token_estimate(&self, context_id: Uuid) -> Result<usize> {
        self.contexts
            .get(&context_id)
            .map(|r| r.token_estimate)
            .ok_or_else(|| EngineError::NotFound(format!("context {}", context_id)))
    }

    /// Clear a context's history, keeping the context itself
    pub fn clear(&self, context_id: Uuid) -> Result<()> {
        let mut record = self
            .contexts
            .get_mut(&context_id)
            .ok_or_else(|| EngineError::NotFound(format!("context {}", context_id)))?;
        record.raw_log = "[]".to_string();
        record.token_estimate = 0;
        record.updated_at = Utc::now();
        Ok(())
    }

    /// Delete a context entirely. Only callers delete contexts; the
    /// orchestrator never does.
    pub fn delete(&self, context_id: Uuid) -> Result<()> {
        self.contexts
            .remove(&context_id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("context {}", context_id)))
    }

    /// Summaries of all stored contexts
    pub fn list(&self) -> Vec<ContextSummary> {
        self.contexts
            .iter()
            .map(|entry| {
                let message_count = serde_json::from_str::<Vec<Message>>(&entry.raw_log)
                    .map(|m| m.len())
                    .unwrap_or(0);
                ContextSummary {
                    id: *entry.key(),
                    name: entry.name.clone(),
                    message_count,
                    token_estimate: entry.token_estimate,
                    created_at: entry.created_at,
                    updated_at: entry.updated_at,
                }
            })
            .collect()
    }

    pub fn contains(&self, context_id: Uuid) -> bool {
        self.contexts.contains_key(&context_id)
    }

    /// Parse a stored log, recovering a corrupted one to an empty history
    fn parse_or_recover(context_id: Uuid, raw: &str) -> Vec<Message> {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            let corruption = EngineError::ContextCorrupted(e.to_string());
            warn!(
                "Context {}: {}; recovering to empty history",
                context_id, corruption
            );
            ENGINE_METRICS.context_recoveries.inc();
            Vec::new()
        })
    }

    /// Remove one non-system message according to the eviction policy
    fn evict_one(&self, messages: &mut Vec<Message>) -> Option<Message> {
        let position = match self.config.eviction {
            EvictionPolicy::OldestFirst => messages
                .iter()
                .position(|m| m.role != MessageRole::System),
            EvictionPolicy::NewestFirst => messages
                .iter()
                .rposition(|m| m.role != MessageRole::System),
        };
        position.map(|i| messages.remove(i))
    }

    #[cfg(test)]
    fn inject_raw_log(&self, context_id: Uuid, raw: &str) {
        let mut record = self.contexts.get_mut(&context_id).unwrap();
        record.raw_log = raw.to_string();
    }
}
