//! Error types for the orchestration engine

use thiserror::Error;

/// Engine-level errors surfaced across the library boundary. Per-call
/// provider failures are not here: they live in `ProviderError` and are
/// absorbed into failed ModelResponses by the orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Every registered model client failed in one turn. Fatal for that
    /// turn; no Decision is persisted.
    #[error("All {attempted} registered providers failed for this turn")]
    AllProvidersFailed { attempted: usize },

    /// Stored context data failed to parse. Recovered locally by resetting
    /// the message log; logged at the recovery site, never returned by
    /// `ask`.
    #[error("Context data corrupted: {0}")]
    ContextCorrupted(String),

    /// A referenced entity (context, decision) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::AllProvidersFailed { attempted: 3 };
        assert_eq!(
            err.to_string(),
            "All 3 registered providers failed for this turn"
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = EngineError::NotFound("decision 42".to_string());
        assert!(err.to_string().contains("decision 42"));
    }

    #[test]
    fn test_context_corrupted_display() {
        let err = EngineError::ContextCorrupted("expected value at line 1".to_string());
        assert_eq!(
            err.to_string(),
            "Context data corrupted: expected value at line 1"
        );
    }
}
