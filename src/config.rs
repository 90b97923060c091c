//! Configuration for the orchestration engine

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Registered model providers, in registration order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// Context history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Token ceiling for one conversation's message history
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Which non-system messages to evict first when over budget
    #[serde(default)]
    pub eviction: EvictionPolicy,
}

/// Eviction order for non-system messages above the token ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    #[default]
    OldestFirst,
    NewestFirst,
}

fn default_max_context_tokens() -> usize {
    100_000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            eviction: EvictionPolicy::OldestFirst,
        }
    }
}

/// Per-turn dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Independent timeout for each provider call in a turn
    #[serde(default = "default_per_call_timeout_ms")]
    pub per_call_timeout_ms: u64,

    /// Maximum tokens requested from each provider
    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: u32,
}

fn default_per_call_timeout_ms() -> u64 {
    2000
}

fn default_max_response_tokens() -> u32 {
    1024
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            per_call_timeout_ms: default_per_call_timeout_ms(),
            max_response_tokens: default_max_response_tokens(),
        }
    }
}

impl DispatchConfig {
    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_millis(self.per_call_timeout_ms)
    }
}

/// Initial sampling parameters for new contexts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

/// Latency tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Number of latency samples retained for percentile computation
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

fn default_window_size() -> usize {
    1000
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
        }
    }
}

/// One registered model provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider kind: "claude" or "openai"
    pub kind: String,

    /// Model identifier sent to the provider
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Override for the provider API base URL
    #[serde(default)]
    pub api_url: Option<String>,

    /// Per-provider timeout override in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ProviderConfig {
    /// Resolve the API key from the configured env var, falling back to the
    /// provider's conventional variable.
    pub fn resolve_api_key(&self, fallback_env: &str) -> Result<String> {
        let env_name = self.api_key_env.as_deref().unwrap_or(fallback_env);
        std::env::var(env_name).map_err(|_| {
            EngineError::Configuration(format!(
                "API key environment variable {} not set for provider {}",
                env_name, self.kind
            ))
        })
    }
}

impl EngineConfig {
    /// Load configuration by layering an optional `orquesta.toml` file and
    /// `ORQUESTA_*` environment variables over the serde defaults.
    pub fn load() -> Result<Self> {
        // .env is optional; ignore a missing file
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .add_source(config::File::with_name("orquesta").required(false))
            .add_source(config::Environment::with_prefix("ORQUESTA").separator("__"))
            .build()
            .map_err(|e| EngineError::Configuration(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| EngineError::Configuration(e.to_string()))
    }
}
