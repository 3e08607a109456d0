// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! LLM client abstraction for drafting summary entries

use crate::config::LLMConfig;
use crate::error::{SummaryError, SummaryResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

const SYSTEM_PROMPT: &str =
    "You maintain chronological conversation summaries. Respond only with valid JSON.";

/// Trait for hosted models that draft summary entries
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Send a prompt and get a JSON response
    async fn complete(&self, prompt: String) -> Result<LLMResponse, LLMError>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Response from LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
}

impl LLMResponse {
    /// Response with no usage accounting, for local and test clients
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
            model: model.into(),
        }
    }

    /// Parse response as JSON
    ///
    /// Models sometimes wrap JSON in a markdown code fence; the fence is
    /// stripped before parsing.
    pub fn as_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(strip_code_fence(&self.content))
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Errors from LLM clients
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LLMError> {
    if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(LLMError::RateLimitExceeded);
    }
    if !response.status().is_success() {
        let error_text = response.text().await?;
        return Err(LLMError::ApiError(error_text));
    }
    Ok(response)
}

/// OpenAI client implementation (also serves OpenAI-compatible endpoints)
pub struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 1024,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(&self, prompt: String) -> Result<LLMResponse, LLMError> {
        let request = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.2,
            "max_tokens": self.max_tokens,
            "response_format": { "type": "json_object" }
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let response_data: serde_json::Value = check_status(response).await?.json().await?;

        let content = response_data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(LLMError::InvalidResponse("Missing content".to_string()))?
            .to_string();

        let usage_data = &response_data["usage"];
        let usage = TokenUsage {
            prompt_tokens: usage_data["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: usage_data["completion_tokens"].as_u64().unwrap_or(0) as u32,
            total_tokens: usage_data["total_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(LLMResponse {
            content,
            usage,
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Anthropic Claude client implementation
pub struct AnthropicClient {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: "https://api.anthropic.com/v1".to_string(),
            max_tokens: 1024,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn complete(&self, prompt: String) -> Result<LLMResponse, LLMError> {
        let request = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "system": SYSTEM_PROMPT,
            "temperature": 0.2
        });

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let response_data: serde_json::Value = check_status(response).await?.json().await?;

        let content = response_data["content"][0]["text"]
            .as_str()
            .ok_or(LLMError::InvalidResponse("Missing content".to_string()))?
            .to_string();

        let usage_data = &response_data["usage"];
        let input_tokens = usage_data["input_tokens"].as_u64().unwrap_or(0) as u32;
        let output_tokens = usage_data["output_tokens"].as_u64().unwrap_or(0) as u32;
        let usage = TokenUsage {
            prompt_tokens: input_tokens,
            completion_tokens: output_tokens,
            total_tokens: input_tokens + output_tokens,
        };

        Ok(LLMResponse {
            content,
            usage,
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Build the client named by the configuration.
pub fn create_client(config: &LLMConfig) -> SummaryResult<Arc<dyn LLMClient>> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| SummaryError::Config(format!("No API key configured for {}", config.provider)))?;

    match config.provider.as_str() {
        "openai" => {
            let mut client = OpenAIClient::new(api_key, config.model.clone())
                .with_max_tokens(config.max_tokens);
            if let Some(base_url) = &config.base_url {
                client = client.with_base_url(base_url.clone());
            }
            Ok(Arc::new(client))
        }
        "anthropic" => {
            let mut client = AnthropicClient::new(api_key, config.model.clone())
                .with_max_tokens(config.max_tokens);
            if let Some(base_url) = &config.base_url {
                client = client.with_base_url(base_url.clone());
            }
            Ok(Arc::new(client))
        }
        other => Err(SummaryError::Config(format!("Unsupported LLM provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_json_strips_code_fence() {
        let fenced = LLMResponse::text("```json\n{\"action\": \"new\"}\n```", "test");
        assert_eq!(fenced.as_json().unwrap()["action"], "new");

        let plain = LLMResponse::text(" {\"action\": \"update\"} ", "test");
        assert_eq!(plain.as_json().unwrap()["action"], "update");

        assert!(LLMResponse::text("not json", "test").as_json().is_err());
    }

    #[test]
    fn test_create_client_requires_key() {
        let config = LLMConfig::default();
        assert!(matches!(create_client(&config), Err(SummaryError::Config(_))));
    }

    #[test]
    fn test_create_client_by_provider() {
        let mut config = LLMConfig {
            api_key: Some("test".to_string()),
            ..LLMConfig::default()
        };
        let client = create_client(&config).unwrap();
        assert_eq!(client.model_name(), "gpt-4o-mini");

        config.provider = "anthropic".to_string();
        config.model = "claude-3-5-haiku-latest".to_string();
        let client = create_client(&config).unwrap();
        assert_eq!(client.model_name(), "claude-3-5-haiku-latest");

        config.provider = "local".to_string();
        assert!(create_client(&config).is_err());
    }
}
