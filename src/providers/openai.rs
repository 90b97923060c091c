//! OpenAI chat completions client

use super::{GenerateOutput, GenerateRequest, ModelClient, ProviderError, DEFAULT_CONFIDENCE};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const DEFAULT_API_URL: &str = "https://api.openai.com";

pub struct OpenAiClient {
    http: Client,
    model: String,
    api_key: String,
    api_url: String,
    timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

impl OpenAiClient {
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
impl ModelClient for OpenAiClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateOutput, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.api_url);

        let mut messages: Vec<serde_json::Value> = req
            .history
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();
        messages.push(json!({ "role": "user", "content": req.prompt }));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": req.params.temperature,
            "top_p": req.params.top_p,
            "max_tokens": req.max_tokens,
        });

        debug!(
            "OpenAI generate: model={}, history={} messages",
            self.model,
            req.history.len()
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
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

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| ProviderError::InvalidResponse("empty choices array".to_string()))?;

        Ok(GenerateOutput {
            text,
            confidence: DEFAULT_CONFIDENCE,
        })
    }
}
