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

//! Update-or-new decisions using an LLM drafter
//!
//! For each digest the model sees the new messages and the newest entries of
//! the log, and answers whether the digest continues the most recent entry or
//! starts a new one, drafting the entry text either way.
//!
//! The model may only ever extend the most recent entry (index 0). Any model
//! failure (client error, timeout, malformed output) produces a
//! deterministic fallback entry that is always added, never merged.

use crate::config::DecisionConfig;
use crate::llm_client::{LLMClient, LLMError, LLMResponse};
use chrono::{DateTime, Utc};
use recap_core::{format_timestamp, ConversationDigest, SummaryLogEntry};
use recap_telemetry::SummaryMetrics;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How a digest changes the summary log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryDecision {
    /// First entry of a new document
    Create { entry: SummaryLogEntry },
    /// Merge into the entry at `index`
    Update { index: usize, entry: SummaryLogEntry },
    /// Prepend to an existing document
    Append { entry: SummaryLogEntry },
}

impl SummaryDecision {
    /// Action label used in logs and metrics
    pub fn action(&self) -> &'static str {
        match self {
            SummaryDecision::Create { .. } => "create",
            SummaryDecision::Update { .. } => "update",
            SummaryDecision::Append { .. } => "append",
        }
    }

    /// The drafted entry
    pub fn entry(&self) -> &SummaryLogEntry {
        match self {
            SummaryDecision::Create { entry }
            | SummaryDecision::Update { entry, .. }
            | SummaryDecision::Append { entry } => entry,
        }
    }
}

/// A decision and whether it came from the fallback path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub decision: SummaryDecision,
    pub used_fallback: bool,
}

/// Why the model's answer could not be used
#[derive(Debug, Error)]
enum GenerationFailure {
    #[error("LLM client error: {0}")]
    Client(#[from] LLMError),

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),
}

/// The model's answer, as described in the prompt's output schema
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftedEntry {
    action: String,
    #[serde(default)]
    index: Option<i64>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    key_points: Option<Vec<String>>,
    #[serde(default)]
    decisions: Option<Vec<String>>,
    #[serde(default)]
    action_items: Option<Vec<String>>,
    #[serde(default)]
    participants: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DraftAction {
    Update,
    New,
}

impl DraftedEntry {
    fn parse(response: &LLMResponse) -> Result<Self, GenerationFailure> {
        let value = response
            .as_json()
            .map_err(|e| GenerationFailure::InvalidOutput(format!("not JSON: {}", e)))?;
        let draft: DraftedEntry = serde_json::from_value(value)
            .map_err(|e| GenerationFailure::InvalidOutput(e.to_string()))?;
        draft.validate()?;
        Ok(draft)
    }

    fn validate(&self) -> Result<(), GenerationFailure> {
        self.draft_action()?;
        if self.title.trim().is_empty() {
            return Err(GenerationFailure::InvalidOutput("empty title".to_string()));
        }
        if self.summary.trim().is_empty() {
            return Err(GenerationFailure::InvalidOutput("empty summary".to_string()));
        }
        Ok(())
    }

    fn draft_action(&self) -> Result<DraftAction, GenerationFailure> {
        match self.action.trim().to_ascii_lowercase().as_str() {
            "update" => Ok(DraftAction::Update),
            "new" => Ok(DraftAction::New),
            other => Err(GenerationFailure::InvalidOutput(format!(
                "unknown action {:?}",
                other
            ))),
        }
    }

    fn into_entry(self, digest: &ConversationDigest, now: DateTime<Utc>) -> SummaryLogEntry {
        SummaryLogEntry::new(&self.title, &self.summary, now)
            .with_window(digest.window_start, digest.window_end)
            .with_key_points(self.key_points.unwrap_or_default())
            .with_decisions(self.decisions.unwrap_or_default())
            .with_action_items(self.action_items.unwrap_or_default())
            .with_participants(self.participants.unwrap_or_default())
    }
}

/// Decides how each digest changes a conversation's summary log
pub struct DecisionEngine {
    llm_client: Arc<dyn LLMClient>,
    prompt_template: String,
    recent_entries: usize,
    generation_timeout: Duration,
    metrics: Option<Arc<SummaryMetrics>>,
}

impl DecisionEngine {
    /// Create a decision engine with the default prompt template
    pub fn new(llm_client: Arc<dyn LLMClient>, config: &DecisionConfig) -> Self {
        Self {
            llm_client,
            prompt_template: Self::default_prompt(),
            recent_entries: config.recent_entries,
            generation_timeout: config.generation_timeout(),
            metrics: None,
        }
    }

    /// Use a custom prompt template
    ///
    /// Placeholders: `{window_start}`, `{window_end}`, `{recent_entries}`,
    /// `{transcript}`.
    pub fn with_prompt_template(mut self, template: String) -> Self {
        self.prompt_template = template;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<SummaryMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn default_prompt() -> String {
        r#"You maintain a chronological summary log for a conversation. New messages
{window_start}-{window_end} have arrived.

Decide whether these messages continue the topic of the most recent entry
(action "update") or start a new topic (action "new"). Only the most recent
entry, index 0, may be updated. When updating, write only what the new
messages add; it will be appended to the existing entry.

RECENT ENTRIES (newest first):
{recent_entries}

NEW MESSAGES:
{transcript}

Respond in JSON format:
{
  "action": "update" | "new",
  "index": 0,
  "title": "short title for the entry",
  "summary": "one paragraph summarizing the new messages",
  "keyPoints": ["..."],
  "decisions": ["..."],
  "actionItems": ["..."],
  "participants": ["..."]
}
"index" is only used with "update". The list fields are optional."#
            .to_string()
    }

    /// Number of newest entries shown to the model
    pub fn recent_entries(&self) -> usize {
        self.recent_entries
    }

    /// Decide how `digest` changes the log.
    ///
    /// `existing` is the parsed log of the stored document, newest first, or
    /// `None` when the conversation has no document yet. Never fails: model
    /// problems are logged and answered with the fallback entry.
    pub async fn decide(
        &self,
        digest: &ConversationDigest,
        existing: Option<&[SummaryLogEntry]>,
    ) -> DecisionOutcome {
        let recent = existing
            .map(|entries| &entries[..entries.len().min(self.recent_entries)])
            .unwrap_or(&[]);
        let has_document = existing.is_some();

        match self.generate(digest, recent).await {
            Ok(draft) => {
                let now = Utc::now();
                let wants_update = draft.draft_action().ok() == Some(DraftAction::Update);
                let index = draft.index.unwrap_or(0);
                let entry = draft.into_entry(digest, now);

                let decision = if wants_update && index == 0 && !recent.is_empty() {
                    SummaryDecision::Update { index: 0, entry }
                } else {
                    if wants_update {
                        tracing::debug!(
                            conversation_id = %digest.conversation_id,
                            index,
                            "Model asked to update an entry it may not target, adding instead"
                        );
                    }
                    Self::add_decision(has_document, entry)
                };

                DecisionOutcome {
                    decision,
                    used_fallback: false,
                }
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %digest.conversation_id,
                    window_start = digest.window_start,
                    window_end = digest.window_end,
                    error = %e,
                    "Summary generation failed, using fallback entry"
                );
                DecisionOutcome {
                    decision: Self::add_decision(has_document, fallback_entry(digest, Utc::now())),
                    used_fallback: true,
                }
            }
        }
    }

    fn add_decision(has_document: bool, entry: SummaryLogEntry) -> SummaryDecision {
        if has_document {
            SummaryDecision::Append { entry }
        } else {
            SummaryDecision::Create { entry }
        }
    }

    async fn generate(
        &self,
        digest: &ConversationDigest,
        recent: &[SummaryLogEntry],
    ) -> Result<DraftedEntry, GenerationFailure> {
        let prompt = self.build_prompt(digest, recent);
        let start = Instant::now();

        let result = match tokio::time::timeout(self.generation_timeout, self.llm_client.complete(prompt)).await {
            Ok(Ok(response)) => DraftedEntry::parse(&response),
            Ok(Err(e)) => Err(GenerationFailure::Client(e)),
            Err(_) => Err(GenerationFailure::Timeout(self.generation_timeout)),
        };

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        if let Some(metrics) = &self.metrics {
            metrics.record_generation(latency_ms, result.is_ok());
        }
        tracing::debug!(
            conversation_id = %digest.conversation_id,
            model = %self.llm_client.model_name(),
            latency_ms,
            "Summary generation finished"
        );

        result
    }

    fn build_prompt(&self, digest: &ConversationDigest, recent: &[SummaryLogEntry]) -> String {
        self.prompt_template
            .replace("{window_start}", &digest.window_start.to_string())
            .replace("{window_end}", &digest.window_end.to_string())
            .replace("{recent_entries}", &describe_recent(recent))
            .replace("{transcript}", &digest.transcript())
    }
}

fn describe_recent(recent: &[SummaryLogEntry]) -> String {
    if recent.is_empty() {
        return "(no previous entries)".to_string();
    }
    recent
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "[{}] {} ({})\n{}",
                i,
                entry.title,
                format_timestamp(&entry.updated),
                entry.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Entry written when the model cannot be used: counts and bounds only.
pub fn fallback_entry(digest: &ConversationDigest, now: DateTime<Utc>) -> SummaryLogEntry {
    SummaryLogEntry::new(
        format!("Messages {}-{}", digest.window_start, digest.window_end),
        format!(
            "{} messages exchanged (messages {}-{}).",
            digest.messages.len(),
            digest.window_start,
            digest.window_end
        ),
        now,
    )
    .with_window(digest.window_start, digest.window_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns a canned reply and remembers the last prompt
    struct MockLLMClient {
        reply: Result<String, String>,
        last_prompt: Mutex<Option<String>>,
    }

    impl MockLLMClient {
        fn replying(content: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(content.to_string()),
                last_prompt: Mutex::new(None),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                last_prompt: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LLMClient for MockLLMClient {
        async fn complete(&self, prompt: String) -> Result<LLMResponse, LLMError> {
            *self.last_prompt.lock().unwrap() = Some(prompt);
            match &self.reply {
                Ok(content) => Ok(LLMResponse::text(content.clone(), "mock-model")),
                Err(message) => Err(LLMError::ApiError(message.clone())),
            }
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }
    }

    /// Never answers
    struct StalledLLMClient;

    #[async_trait]
    impl LLMClient for StalledLLMClient {
        async fn complete(&self, _prompt: String) -> Result<LLMResponse, LLMError> {
            std::future::pending().await
        }

        fn model_name(&self) -> &str {
            "stalled"
        }
    }

    fn digest() -> ConversationDigest {
        ConversationDigest::new("conv-1", 21, 40)
            .message("alice", "Can we ship on Friday?")
            .message("bob", "QA needs one more day.")
    }

    fn existing() -> Vec<SummaryLogEntry> {
        (0..5)
            .map(|i| SummaryLogEntry::new(format!("Entry {}", i), format!("content {}", i), Utc::now()))
            .collect()
    }

    fn engine(client: Arc<dyn LLMClient>) -> DecisionEngine {
        DecisionEngine::new(client, &DecisionConfig::default())
    }

    #[tokio::test]
    async fn test_update_most_recent_entry() {
        let client = MockLLMClient::replying(
            r#"{"action": "update", "index": 0, "title": "Release", "summary": "QA asked for a day.",
                "participants": ["alice", "bob", "alice"], "keyPoints": ["QA delay"]}"#,
        );
        let entries = existing();
        let outcome = engine(client.clone()).decide(&digest(), Some(&entries[..])).await;

        assert!(!outcome.used_fallback);
        let SummaryDecision::Update { index, entry } = outcome.decision else {
            panic!("expected update");
        };
        assert_eq!(index, 0);
        assert_eq!(entry.content, "QA asked for a day.");
        assert_eq!(entry.participants, vec!["alice", "bob"]);
        assert_eq!(entry.key_points, vec!["QA delay"]);
        assert_eq!((entry.window_start, entry.window_end), (Some(21), Some(40)));
        assert_eq!(entry.created, entry.updated);

        let prompt = client.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("alice: Can we ship on Friday?"));
        assert!(prompt.contains("[2] Entry 2"));
        assert!(!prompt.contains("Entry 3"));
    }

    #[tokio::test]
    async fn test_update_without_index_targets_most_recent() {
        let client = MockLLMClient::replying(r#"{"action": "update", "title": "t", "summary": "s"}"#);
        let entries = existing();
        let outcome = engine(client).decide(&digest(), Some(&entries[..])).await;
        assert_eq!(outcome.decision.action(), "update");
    }

    #[tokio::test]
    async fn test_update_other_index_becomes_append() {
        let client =
            MockLLMClient::replying(r#"{"action": "update", "index": 2, "title": "t", "summary": "s"}"#);
        let entries = existing();
        let outcome = engine(client).decide(&digest(), Some(&entries[..])).await;
        assert_eq!(outcome.decision.action(), "append");
        assert!(!outcome.used_fallback);
    }

    #[tokio::test]
    async fn test_update_with_no_entries() {
        let client = MockLLMClient::replying(r#"{"action": "update", "index": 0, "title": "t", "summary": "s"}"#);

        let outcome = engine(client.clone()).decide(&digest(), None).await;
        assert_eq!(outcome.decision.action(), "create");

        let outcome = engine(client).decide(&digest(), Some(&[][..])).await;
        assert_eq!(outcome.decision.action(), "append");
    }

    #[tokio::test]
    async fn test_new_topic() {
        let client = MockLLMClient::replying(r#"{"action": "NEW", "title": "Hiring", "summary": "Opened a role."}"#);
        let entries = existing();
        let outcome = engine(client).decide(&digest(), Some(&entries[..])).await;

        let SummaryDecision::Append { entry } = outcome.decision else {
            panic!("expected append");
        };
        assert_eq!(entry.title, "Hiring");
        assert!(entry.decisions.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_output_falls_back() {
        let replies = [
            "I think this is an update.",
            r#"{"action": "merge", "title": "t", "summary": "s"}"#,
            r#"{"action": "update", "title": "  ", "summary": "s"}"#,
            r#"{"action": "new", "title": "t", "summary": ""}"#,
            r#"{"title": "t", "summary": "s"}"#,
        ];
        let entries = existing();
        for reply in replies {
            let outcome = engine(MockLLMClient::replying(reply)).decide(&digest(), Some(&entries[..])).await;
            assert!(outcome.used_fallback, "reply should be rejected: {}", reply);
            assert_eq!(outcome.decision.action(), "append");
        }
    }

    #[tokio::test]
    async fn test_client_error_never_updates() {
        let entries = existing();
        let outcome = engine(MockLLMClient::failing("boom")).decide(&digest(), Some(&entries[..])).await;

        assert!(outcome.used_fallback);
        let SummaryDecision::Append { entry } = outcome.decision else {
            panic!("expected append");
        };
        assert_eq!(entry.title, "Messages 21-40");
        assert_eq!(entry.content, "2 messages exchanged (messages 21-40).");
        assert!(entry.key_points.is_empty());
        assert!(entry.participants.is_empty());

        let outcome = engine(MockLLMClient::failing("boom")).decide(&digest(), None).await;
        assert_eq!(outcome.decision.action(), "create");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let entries = existing();
        let outcome = engine(Arc::new(StalledLLMClient)).decide(&digest(), Some(&entries[..])).await;
        assert!(outcome.used_fallback);
        assert_eq!(outcome.decision.action(), "append");
    }

    #[tokio::test]
    async fn test_custom_prompt_template() {
        let client = MockLLMClient::replying(r#"{"action": "new", "title": "t", "summary": "s"}"#);
        let engine = engine(client.clone())
            .with_prompt_template("{window_start}..{window_end}|{recent_entries}|{transcript}".to_string());
        engine.decide(&digest(), None).await;

        let prompt = client.last_prompt.lock().unwrap().clone().unwrap();
        assert_eq!(
            prompt,
            "21..40|(no previous entries)|alice: Can we ship on Friday?\nbob: QA needs one more day."
        );
    }
}
