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

//! Summary system configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the summary engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub storage: StorageConfig,
    pub decision: DecisionConfig,
    pub llm: LLMConfig,
    pub subscriber: SubscriberConfig,
    pub telemetry: TelemetryConfig,
}

/// Where summary documents are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local map, lost on exit
    Memory,
    /// One JSON file per document under `data_dir`
    #[default]
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Data directory for persistent storage
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recap")
            .join("summaries");

        Self {
            backend: StorageBackend::File,
            data_dir,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// How many of the newest entries the model sees
    pub recent_entries: usize,
    /// Upper bound on a single model call
    pub generation_timeout_secs: u64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            recent_entries: 3,
            generation_timeout_secs: 30,
        }
    }
}

impl DecisionConfig {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

/// Hosted model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    /// Provider: "openai" or "anthropic"
    pub provider: String,
    /// Model name
    pub model: String,
    /// API key; read from the provider's usual environment variable when unset
    pub api_key: Option<String>,
    /// Override for OpenAI-compatible endpoints
    pub base_url: Option<String>,
    pub max_tokens: u32,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberConfig {
    /// Capacity of the inbound digest channel
    pub channel_capacity: usize,
    /// Conversations processed at the same time
    pub max_concurrent_conversations: usize,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            max_concurrent_conversations: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// OTLP collector endpoint; local-only tracing when unset
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "recap".to_string(),
            otlp_endpoint: None,
        }
    }
}

impl SummaryConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults with environment variable overrides applied
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - RECAP_STORAGE_BACKEND: `memory` or `file`
    /// - RECAP_DATA_DIR: Data directory path
    /// - RECAP_RECENT_ENTRIES: Entries shown to the model (default: 3)
    /// - RECAP_GENERATION_TIMEOUT: Model call timeout in seconds (default: 30)
    /// - RECAP_LLM_PROVIDER / RECAP_LLM_MODEL / RECAP_LLM_BASE_URL
    /// - OPENAI_API_KEY / ANTHROPIC_API_KEY: used when no key is configured
    /// - RECAP_MAX_CONCURRENT_CONVERSATIONS
    /// - RECAP_OTLP_ENDPOINT
    pub fn apply_env(mut self) -> Self {
        if let Ok(backend) = std::env::var("RECAP_STORAGE_BACKEND") {
            match backend.to_ascii_lowercase().as_str() {
                "memory" => self.storage.backend = StorageBackend::Memory,
                "file" => self.storage.backend = StorageBackend::File,
                other => tracing::warn!("Unknown storage backend {:?}, keeping configured", other),
            }
        }

        if let Ok(data_dir) = std::env::var("RECAP_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(recent) = std::env::var("RECAP_RECENT_ENTRIES") {
            if let Ok(val) = recent.parse() {
                self.decision.recent_entries = val;
            }
        }

        if let Ok(timeout) = std::env::var("RECAP_GENERATION_TIMEOUT") {
            if let Ok(val) = timeout.parse() {
                self.decision.generation_timeout_secs = val;
            }
        }

        if let Ok(provider) = std::env::var("RECAP_LLM_PROVIDER") {
            self.llm.provider = provider;
        }

        if let Ok(model) = std::env::var("RECAP_LLM_MODEL") {
            self.llm.model = model;
        }

        if let Ok(base_url) = std::env::var("RECAP_LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }

        if self.llm.api_key.is_none() {
            let key_var = match self.llm.provider.as_str() {
                "anthropic" => "ANTHROPIC_API_KEY",
                _ => "OPENAI_API_KEY",
            };
            self.llm.api_key = std::env::var(key_var).ok();
        }

        if let Ok(max) = std::env::var("RECAP_MAX_CONCURRENT_CONVERSATIONS") {
            if let Ok(val) = max.parse() {
                self.subscriber.max_concurrent_conversations = val;
            }
        }

        if let Ok(endpoint) = std::env::var("RECAP_OTLP_ENDPOINT") {
            self.telemetry.otlp_endpoint = Some(endpoint);
        }

        self
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        Ok(config.apply_env())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.decision.recent_entries == 0 {
            anyhow::bail!("decision.recent_entries must be at least 1");
        }
        if self.decision.generation_timeout_secs == 0 {
            anyhow::bail!("decision.generation_timeout_secs must be at least 1");
        }
        if self.subscriber.max_concurrent_conversations == 0 {
            anyhow::bail!("subscriber.max_concurrent_conversations must be at least 1");
        }
        if !matches!(self.llm.provider.as_str(), "openai" | "anthropic") {
            anyhow::bail!("Unsupported LLM provider: {}", self.llm.provider);
        }
        Ok(())
    }
}
