// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Digest processing
//!
//! Turns one digest into one document write: load, decide, merge, persist.
//! Read-modify-write for a conversation is serialized by a per-conversation
//! lock; different conversations proceed in parallel.

use crate::codec::{build_document, parse_document, parse_entries, serialize_entries};
use crate::decision::DecisionEngine;
use crate::directory::ConversationDirectory;
use crate::error::{SummaryError, SummaryResult};
use crate::merger::apply_decision;
use crate::store::DocumentStore;
use dashmap::DashMap;
use recap_core::{ConversationDigest, DocumentMetadata, SummaryDocument, SummaryLogEntry};
use recap_telemetry::SummaryMetrics;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// What processing a digest did to the conversation's document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestReport {
    pub document_id: String,
    /// `create`, `update` or `append`
    pub action: &'static str,
    pub entry_count: usize,
    pub total_messages: u64,
    /// Whether the entry came from the fallback path
    pub used_fallback: bool,
}

/// Folds digests into per-conversation summary documents
pub struct DigestOrchestrator {
    store: Arc<dyn DocumentStore>,
    directory: Arc<dyn ConversationDirectory>,
    decision_engine: DecisionEngine,
    locks: DashMap<String, Arc<Mutex<()>>>,
    metrics: Option<Arc<SummaryMetrics>>,
}

impl DigestOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        directory: Arc<dyn ConversationDirectory>,
        decision_engine: DecisionEngine,
    ) -> Self {
        Self {
            store,
            directory,
            decision_engine,
            locks: DashMap::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<SummaryMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Process one digest
    ///
    /// Invalid digests are rejected before any I/O. Store and directory
    /// failures abort without writing; model failures do not (see
    /// [`DecisionEngine::decide`]).
    #[tracing::instrument(
        skip(self, digest),
        fields(
            conversation_id = %digest.conversation_id,
            window_start = digest.window_start,
            window_end = digest.window_end
        )
    )]
    pub async fn handle_digest(&self, digest: &ConversationDigest) -> SummaryResult<DigestReport> {
        let result = match digest.validate() {
            Ok(()) => {
                let lock = self.lock_for(&digest.conversation_id);
                let result = {
                    let _guard = lock.lock().await;
                    self.process(digest).await
                };
                drop(lock);
                self.release_lock(&digest.conversation_id);
                result
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = &result {
            tracing::error!(error = %e, "Failed to process digest");
            if let Some(metrics) = &self.metrics {
                metrics.record_failure(e.reason());
            }
        }
        result
    }

    /// Process digests one after another, stopping at the first failure
    ///
    /// Digests before the failing one stay applied. The batch is not
    /// parallelized because digests for the same conversation must land in
    /// order; running different conversations concurrently is left to
    /// [`crate::subscriber::DigestSubscriber`].
    pub async fn handle_digest_batch(
        &self,
        digests: &[ConversationDigest],
    ) -> SummaryResult<Vec<DigestReport>> {
        let mut reports = Vec::with_capacity(digests.len());
        for digest in digests {
            reports.push(self.handle_digest(digest).await?);
        }
        Ok(reports)
    }

    async fn process(&self, digest: &ConversationDigest) -> SummaryResult<DigestReport> {
        let document_id = SummaryDocument::id_for(&digest.conversation_id);
        let existing = self.store.get(SummaryDocument::KIND, &document_id).await?;
        let existing_entries = existing.as_ref().map(load_entries);

        let outcome = self
            .decision_engine
            .decide(digest, existing_entries.as_deref())
            .await;
        let action = outcome.decision.action();
        let entries = apply_decision(existing_entries.unwrap_or_default(), outcome.decision);

        let previous_total = existing
            .as_ref()
            .map(|doc| doc.metadata.total_messages)
            .unwrap_or(0);
        let total_messages = previous_total.max(digest.window_end);

        let info = self
            .directory
            .get_conversation(&digest.conversation_id)
            .await?
            .ok_or_else(|| SummaryError::ConversationNotFound(digest.conversation_id.clone()))?;

        let mut metadata = DocumentMetadata::for_conversation(digest.conversation_id.clone(), &info);
        metadata.entry_count = entries.len();
        metadata.total_messages = total_messages;

        let content = build_document(&serialize_entries(&entries), &metadata);
        let created = existing
            .as_ref()
            .map(|doc| doc.created)
            .unwrap_or(digest.timestamp);
        let document = SummaryDocument::new(metadata, content, created, digest.timestamp);
        self.store.upsert(&document).await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_digest(&info.interface_type, action, outcome.used_fallback);
        }
        tracing::info!(
            action,
            entry_count = entries.len(),
            total_messages,
            used_fallback = outcome.used_fallback,
            "Summary document updated"
        );

        Ok(DigestReport {
            document_id,
            action,
            entry_count: entries.len(),
            total_messages,
            used_fallback: outcome.used_fallback,
        })
    }

    fn lock_for(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the conversation's lock once nobody holds or waits on it
    fn release_lock(&self, conversation_id: &str) {
        self.locks
            .remove_if(conversation_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Parse a stored document's entries, treating unreadable text as an empty log
pub(crate) fn load_entries(document: &SummaryDocument) -> Vec<SummaryLogEntry> {
    let parsed = parse_document(&document.content);
    let entries = parse_entries(&parsed.body);

    if entries.is_empty() && !parsed.body.trim().is_empty() {
        tracing::warn!(
            document_id = %document.id,
            "Stored summary has no readable entries, starting from an empty log"
        );
    } else if parsed.has_header && parsed.metadata.entry_count != entries.len() {
        tracing::warn!(
            document_id = %document.id,
            recorded = parsed.metadata.entry_count,
            parsed = entries.len(),
            "Stored entry count does not match the log"
        );
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecisionConfig;
    use crate::directory::StaticConversationDirectory;
    use crate::llm_client::{LLMClient, LLMError, LLMResponse};
    use crate::store::InMemoryDocumentStore;
    use async_trait::async_trait;
    use recap_core::ConversationInfo;

    struct MockLLMClient {
        reply: String,
    }

    #[async_trait]
    impl LLMClient for MockLLMClient {
        async fn complete(&self, _prompt: String) -> Result<LLMResponse, LLMError> {
            Ok(LLMResponse::text(self.reply.clone(), "mock-model"))
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }
    }

    async fn orchestrator(
        reply: &str,
    ) -> (DigestOrchestrator, Arc<InMemoryDocumentStore>, Arc<StaticConversationDirectory>) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let directory = Arc::new(StaticConversationDirectory::new());
        directory
            .register("conv-1", ConversationInfo::new("general", "C042", "slack"))
            .await;
        let client = Arc::new(MockLLMClient {
            reply: reply.to_string(),
        });
        let engine = DecisionEngine::new(client, &DecisionConfig::default());
        (
            DigestOrchestrator::new(store.clone(), directory.clone(), engine),
            store,
            directory,
        )
    }

    const NEW_TOPIC: &str = r#"{"action": "new", "title": "Topic", "summary": "Talked."}"#;

    #[tokio::test]
    async fn test_invalid_digest_rejected_before_io() {
        let (orchestrator, store, _) = orchestrator(NEW_TOPIC).await;
        let digest = ConversationDigest::new("conv-1", 10, 5);

        let err = orchestrator.handle_digest(&digest).await.unwrap_err();
        assert!(matches!(err, SummaryError::InvalidDigest(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_fatal() {
        let (orchestrator, store, _) = orchestrator(NEW_TOPIC).await;
        let digest = ConversationDigest::new("conv-unknown", 1, 3).message("user", "hi");

        let err = orchestrator.handle_digest(&digest).await.unwrap_err();
        assert!(matches!(err, SummaryError::ConversationNotFound(id) if id == "conv-unknown"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_document_fields() {
        let (orchestrator, store, _) = orchestrator(NEW_TOPIC).await;
        let first = ConversationDigest::new("conv-1", 1, 20).message("user", "hi");
        let second = ConversationDigest::new("conv-1", 21, 40)
            .message("user", "again")
            .timestamp(first.timestamp + chrono::Duration::minutes(5));

        orchestrator.handle_digest(&first).await.unwrap();
        let report = orchestrator.handle_digest(&second).await.unwrap();
        assert_eq!(report.document_id, "summary-conv-1");
        assert_eq!(report.action, "append");

        let doc = store
            .get(SummaryDocument::KIND, "summary-conv-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.created, first.timestamp);
        assert_eq!(doc.updated, second.timestamp);
        assert_eq!(doc.metadata.channel_name, "general");
        assert_eq!(doc.metadata.entry_count, 2);
        assert!(doc.content.starts_with("---\nconversation_id: conv-1\n"));
    }

    #[tokio::test]
    async fn test_malformed_stored_content_starts_fresh() {
        let (orchestrator, store, _) = orchestrator(NEW_TOPIC).await;
        let now = chrono::Utc::now();
        let mut metadata = DocumentMetadata {
            conversation_id: "conv-1".to_string(),
            ..DocumentMetadata::default()
        };
        metadata.total_messages = 50;
        store
            .upsert(&SummaryDocument::new(metadata, "free-form notes".to_string(), now, now))
            .await
            .unwrap();

        let digest = ConversationDigest::new("conv-1", 51, 60).message("user", "hi");
        let report = orchestrator.handle_digest(&digest).await.unwrap();
        assert_eq!(report.action, "append");
        assert_eq!(report.entry_count, 1);
        assert_eq!(report.total_messages, 60);
    }

    #[tokio::test]
    async fn test_locks_are_released() {
        let (orchestrator, _, _) = orchestrator(NEW_TOPIC).await;
        let digest = ConversationDigest::new("conv-1", 1, 2).message("user", "hi");
        orchestrator.handle_digest(&digest).await.unwrap();
        assert!(orchestrator.locks.is_empty());
    }

    #[tokio::test]
    async fn test_batch_stops_at_first_error() {
        let (orchestrator, store, _) = orchestrator(NEW_TOPIC).await;
        let digests = vec![
            ConversationDigest::new("conv-1", 1, 10).message("user", "a"),
            ConversationDigest::new("conv-missing", 1, 10).message("user", "b"),
            ConversationDigest::new("conv-1", 11, 20).message("user", "c"),
        ];

        assert!(orchestrator.handle_digest_batch(&digests).await.is_err());
        let doc = store
            .get(SummaryDocument::KIND, "summary-conv-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.metadata.total_messages, 10);
        assert_eq!(doc.metadata.entry_count, 1);
    }
}
