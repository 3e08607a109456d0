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

//! Summary engine: wires configuration and collaborators together

use crate::config::SummaryConfig;
use crate::decision::DecisionEngine;
use crate::directory::ConversationDirectory;
use crate::error::{SummaryError, SummaryResult};
use crate::llm_client::{create_client, LLMClient};
use crate::orchestrator::{load_entries, DigestOrchestrator, DigestReport};
use crate::store::{open_store, DocumentStore};
use crate::subscriber::{DigestSubscriber, SubscriberStats};
use async_channel::Receiver;
use recap_core::{ConversationDigest, SummaryDocument, SummaryLogEntry};
use recap_telemetry::SummaryMetrics;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A stored summary with its parsed entry log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub document: SummaryDocument,
    /// Entries, newest first
    pub entries: Vec<SummaryLogEntry>,
}

/// Entry point for embedding the summary system
pub struct SummaryEngine {
    config: SummaryConfig,
    store: Arc<dyn DocumentStore>,
    orchestrator: Arc<DigestOrchestrator>,
}

impl SummaryEngine {
    /// Create an engine over explicit collaborators
    pub fn new(
        config: SummaryConfig,
        store: Arc<dyn DocumentStore>,
        directory: Arc<dyn ConversationDirectory>,
        llm_client: Arc<dyn LLMClient>,
    ) -> Self {
        Self::build(config, store, directory, llm_client, None)
    }

    /// Like [`SummaryEngine::new`], recording metrics as digests are processed
    pub fn with_metrics(
        config: SummaryConfig,
        store: Arc<dyn DocumentStore>,
        directory: Arc<dyn ConversationDirectory>,
        llm_client: Arc<dyn LLMClient>,
        metrics: Arc<SummaryMetrics>,
    ) -> Self {
        Self::build(config, store, directory, llm_client, Some(metrics))
    }

    /// Open the configured store and model client
    pub async fn from_config(
        config: SummaryConfig,
        directory: Arc<dyn ConversationDirectory>,
        metrics: Option<Arc<SummaryMetrics>>,
    ) -> SummaryResult<Self> {
        config
            .validate()
            .map_err(|e| SummaryError::Config(e.to_string()))?;
        let store = open_store(&config.storage).await?;
        let llm_client = create_client(&config.llm)?;
        Ok(Self::build(config, store, directory, llm_client, metrics))
    }

    fn build(
        config: SummaryConfig,
        store: Arc<dyn DocumentStore>,
        directory: Arc<dyn ConversationDirectory>,
        llm_client: Arc<dyn LLMClient>,
        metrics: Option<Arc<SummaryMetrics>>,
    ) -> Self {
        let mut decision_engine = DecisionEngine::new(llm_client, &config.decision);
        if let Some(metrics) = &metrics {
            decision_engine = decision_engine.with_metrics(metrics.clone());
        }

        let mut orchestrator = DigestOrchestrator::new(store.clone(), directory, decision_engine);
        if let Some(metrics) = metrics {
            orchestrator = orchestrator.with_metrics(metrics);
        }

        Self {
            config,
            store,
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    /// Fold one digest into its conversation's summary
    pub async fn handle_digest(&self, digest: &ConversationDigest) -> SummaryResult<DigestReport> {
        self.orchestrator.handle_digest(digest).await
    }

    /// Fold digests in order, stopping at the first failure
    pub async fn handle_digest_batch(
        &self,
        digests: &[ConversationDigest],
    ) -> SummaryResult<Vec<DigestReport>> {
        self.orchestrator.handle_digest_batch(digests).await
    }

    /// A conversation's summary, if one has been written
    pub async fn get_summary(&self, conversation_id: &str) -> SummaryResult<Option<ConversationSummary>> {
        let document = self
            .store
            .get(SummaryDocument::KIND, &SummaryDocument::id_for(conversation_id))
            .await?;

        Ok(document.map(|document| ConversationSummary {
            entries: load_entries(&document),
            document,
        }))
    }

    /// Summary documents, most recently updated first
    pub async fn list_summaries(&self, limit: Option<usize>) -> SummaryResult<Vec<SummaryDocument>> {
        self.store.list(SummaryDocument::KIND, limit).await
    }

    /// Remove a conversation's summary, returning whether one existed
    pub async fn delete_summary(&self, conversation_id: &str) -> SummaryResult<bool> {
        let deleted = self
            .store
            .delete(SummaryDocument::KIND, &SummaryDocument::id_for(conversation_id))
            .await?;
        if deleted {
            tracing::info!(conversation_id = %conversation_id, "Deleted conversation summary");
        }
        Ok(deleted)
    }

    /// Start consuming digests from `receiver` on a background task
    ///
    /// The task finishes once the channel is closed and all queued digests
    /// have been processed.
    pub fn spawn_subscriber(&self, receiver: Receiver<ConversationDigest>) -> JoinHandle<SubscriberStats> {
        let subscriber = DigestSubscriber::new(
            self.orchestrator.clone(),
            self.config.subscriber.max_concurrent_conversations,
        );
        tokio::spawn(subscriber.run(receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use crate::directory::StaticConversationDirectory;
    use crate::llm_client::{LLMError, LLMResponse};
    use crate::store::InMemoryDocumentStore;
    use crate::subscriber::digest_channel;
    use async_trait::async_trait;
    use recap_core::ConversationInfo;

    struct MockLLMClient;

    #[async_trait]
    impl LLMClient for MockLLMClient {
        async fn complete(&self, _prompt: String) -> Result<LLMResponse, LLMError> {
            Ok(LLMResponse::text(
                r#"{"action": "update", "index": 0, "title": "Standup", "summary": "More updates."}"#,
                "mock-model",
            ))
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }
    }

    async fn engine() -> SummaryEngine {
        let directory = Arc::new(StaticConversationDirectory::new());
        directory
            .register("conv-1", ConversationInfo::new("standup", "C7", "slack"))
            .await;
        SummaryEngine::new(
            SummaryConfig::default(),
            Arc::new(InMemoryDocumentStore::new()),
            directory,
            Arc::new(MockLLMClient),
        )
    }

    #[tokio::test]
    async fn test_summary_lifecycle() {
        let engine = engine().await;
        assert!(engine.get_summary("conv-1").await.unwrap().is_none());

        let digests = vec![
            ConversationDigest::new("conv-1", 1, 10).message("alice", "yesterday: tests"),
            ConversationDigest::new("conv-1", 11, 20).message("bob", "today: docs"),
        ];
        let reports = engine.handle_digest_batch(&digests).await.unwrap();
        assert_eq!(reports[0].action, "create");
        assert_eq!(reports[1].action, "update");

        let summary = engine.get_summary("conv-1").await.unwrap().unwrap();
        assert_eq!(summary.entries.len(), 1);
        assert_eq!(summary.entries[0].content, "More updates.\n\nUPDATE: More updates.");
        assert_eq!(summary.document.metadata.total_messages, 20);

        assert_eq!(engine.list_summaries(None).await.unwrap().len(), 1);
        assert!(engine.delete_summary("conv-1").await.unwrap());
        assert!(!engine.delete_summary("conv-1").await.unwrap());
        assert!(engine.get_summary("conv-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_spawn_subscriber() {
        let engine = engine().await;
        let (sender, receiver) = digest_channel(8);
        let handle = engine.spawn_subscriber(receiver);

        sender
            .send(ConversationDigest::new("conv-1", 1, 5).message("alice", "hi"))
            .await
            .unwrap();
        drop(sender);

        let stats = handle.await.unwrap();
        assert_eq!(stats.processed, 1);
        assert!(engine.get_summary("conv-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_from_config_requires_api_key() {
        let mut config = SummaryConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.llm.api_key = None;

        let directory = Arc::new(StaticConversationDirectory::new());
        let result = SummaryEngine::from_config(config, directory, None).await;
        assert!(matches!(result, Err(SummaryError::Config(_))));
    }
}
