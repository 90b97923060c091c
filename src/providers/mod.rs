//! Model provider clients
//!
//! Each provider implements the `ModelClient` capability trait. New
//! providers are added by implementing the trait and registering the client,
//! not by subclassing anything. Clients translate provider-side failures
//! into `ProviderError` values; they never panic on error payloads, and they
//! honor the timeout supplied with each request.

pub mod claude;
pub mod openai;

pub use claude::ClaudeClient;
pub use openai::OpenAiClient;

use crate::config::ProviderConfig;
use crate::context::Message;
use crate::control::ControlParams;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Neutral confidence used when a provider does not report one. The
/// orchestrator never infers confidence on a client's behalf.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Provider-local errors, absorbed into failed ModelResponses by the
/// orchestrator
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Upstream error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout(_))
    }
}

/// One generation request, carrying the turn's snapshotted context and
/// control parameters
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub history: Vec<Message>,
    pub params: ControlParams,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// One provider's answer
#[derive(Debug, Clone)]
pub struct GenerateOutput {
    pub text: String,
    pub confidence: f32,
}

/// Capability interface for one remote model provider
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Stable name recorded on every ModelResponse from this client
    fn name(&self) -> &str;

    /// Per-client timeout bound; `None` means the engine-wide per-call
    /// timeout applies
    fn timeout_override(&self) -> Option<Duration> {
        None
    }

    async fn generate(&self, req: &GenerateRequest) -> std::result::Result<GenerateOutput, ProviderError>;
}

impl std::fmt::Debug for dyn ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("name", &self.name())
            .finish()
    }
}

/// Build clients from configuration, preserving registration order
pub fn build_clients(configs: &[ProviderConfig]) -> Result<Vec<Arc<dyn ModelClient>>> {
    let mut clients: Vec<Arc<dyn ModelClient>> = Vec::with_capacity(configs.len());

    for config in configs {
        let timeout = config.timeout_ms.map(Duration::from_millis);
        match config.kind.as_str() {
            "claude" => {
                let api_key = config.resolve_api_key("ANTHROPIC_API_KEY")?;
                clients.push(Arc::new(ClaudeClient::new(
                    config.model.clone(),
                    api_key,
                    config.api_url.clone(),
                    timeout,
                )?));
            }
            "openai" => {
                let api_key = config.resolve_api_key("OPENAI_API_KEY")?;
                clients.push(Arc::new(OpenAiClient::new(
                    config.model.clone(),
                    api_key,
                    config.api_url.clone(),
                    timeout,
                )?));
            }
            other => {
                return Err(EngineError::Configuration(format!(
                    "Unknown provider kind: {}",
                    other
                )));
            }
        }
    }

    info!("Registered {} model clients", clients.len());

    Ok(clients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_kind() {
        let configs = vec![ProviderConfig {
            kind: "mystery".to_string(),
            model: "m".to_string(),
            api_key_env: None,
            api_url: None,
            timeout_ms: None,
        }];
        let err = build_clients(&configs).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_timeout_classification() {
        assert!(ProviderError::Timeout("t".into()).is_timeout());
        assert!(!ProviderError::Request("r".into()).is_timeout());
    }
}
