//! Anthropic Claude model client

use super::{GenerateOutput, GenerateRequest, ModelClient, ProviderError, DEFAULT_CONFIDENCE};
use crate::context::MessageRole;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const DEFAULT_API_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct ClaudeClient {
    http: Client,
    model: String,
    api_key: String,
    api_url: String,
    timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl ClaudeClient {
    pub fn new(
        model: String,
        api_key: String,
        api_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, crate::error::EngineError> {
        let http = Client::builder()
            .build()
            .map_err(|e| crate::error::EngineError::Internal(e.to_string()))?;

        Ok(Self {
            http,
            model,
            api_key,
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            timeout,
        })
    }
}

#[async_trait]
impl ModelClient for ClaudeClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateOutput, ProviderError> {
        let url = format!("{}/v1/messages", self.api_url);

        // The messages API takes system text as a top-level field
        let system: String = req
            .history
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut messages: Vec<serde_json::Value> = req
            .history
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();
        messages.push(json!({ "role": "user", "content": req.prompt }));

        let mut body = json!({
            "model": self.model,
            "max_tokens": req.max_tokens,
            "messages": messages,
            "temperature": req.params.temperature,
            "top_p": req.params.top_p,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }

        debug!(
            "Claude generate: model={}, history={} messages",
            self.model,
            req.history.len()
        );

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(req.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| ProviderError::InvalidResponse("empty content array".to_string()))?;

        // Anthropic does not report a confidence; use the neutral default
        Ok(GenerateOutput {
            text,
            confidence: DEFAULT_CONFIDENCE,
        })
    }
}
