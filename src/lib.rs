//! Multi-model orchestration engine
//!
//! Dispatches each user turn to every registered model provider
//! concurrently, aggregates the answers into a confidence-ranked Decision,
//! and maintains the surrounding machinery a long-running conversation
//! needs: token-budgeted context histories with corruption recovery,
//! per-context adaptive sampling parameters, human feedback recording, and
//! latency metrics with interpolated percentiles.
//!
//! The [`MultiModelOrchestrator`] is the entry point; the area modules can
//! also be used on their own.

pub mod config;
pub mod context;
pub mod control;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod providers;
pub mod store;

pub use config::{EngineConfig, EvictionPolicy, ProviderConfig};
pub use context::{ContextManager, ContextSummary, Message, MessageRole};
pub use control::{ControlParams, ControlStore};
pub use error::{EngineError, Result};
pub use metrics::{MetricsSnapshot, TurnMetrics, ENGINE_METRICS};
pub use orchestrator::{HealthReport, MultiModelOrchestrator, TurnOutcome};
pub use providers::{GenerateOutput, GenerateRequest, ModelClient, ProviderError};
pub use store::{Decision, DecisionStore, HumanFeedback, ModelResponse};

/// Commonly used types for downstream code
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::context::{ContextManager, Message, MessageRole};
    pub use crate::control::{ControlParams, ControlStore};
    pub use crate::error::{EngineError, Result};
    pub use crate::metrics::TurnMetrics;
    pub use crate::orchestrator::{MultiModelOrchestrator, TurnOutcome};
    pub use crate::providers::{GenerateOutput, GenerateRequest, ModelClient};
    pub use crate::store::{Decision, DecisionStore, HumanFeedback, ModelResponse};
}

/// Install the global tracing subscriber, honoring `RUST_LOG`
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
