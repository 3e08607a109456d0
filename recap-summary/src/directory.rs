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

//! Conversation metadata lookup

use crate::error::{SummaryError, SummaryResult};
use async_trait::async_trait;
use recap_core::ConversationInfo;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

/// Source of channel details for conversations
#[async_trait]
pub trait ConversationDirectory: Send + Sync {
    /// Channel details for a conversation; `Ok(None)` when unknown
    async fn get_conversation(&self, conversation_id: &str) -> SummaryResult<Option<ConversationInfo>>;
}

/// Directory backed by an explicitly populated map
#[derive(Debug, Default)]
pub struct StaticConversationDirectory {
    conversations: RwLock<HashMap<String, ConversationInfo>>,
}

impl StaticConversationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON object mapping conversation ids to channel details
    pub async fn from_file(path: impl AsRef<Path>) -> SummaryResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SummaryError::Directory(format!("reading {}: {}", path.display(), e)))?;
        let conversations: HashMap<String, ConversationInfo> = serde_json::from_str(&content)
            .map_err(|e| SummaryError::Directory(format!("parsing {}: {}", path.display(), e)))?;

        tracing::info!(
            path = %path.display(),
            conversations = conversations.len(),
            "Loaded conversation directory"
        );
        Ok(Self {
            conversations: RwLock::new(conversations),
        })
    }

    /// Register or replace a conversation's channel details
    pub async fn register(&self, conversation_id: impl Into<String>, info: ConversationInfo) {
        self.conversations
            .write()
            .await
            .insert(conversation_id.into(), info);
    }

    pub async fn remove(&self, conversation_id: &str) -> bool {
        self.conversations.write().await.remove(conversation_id).is_some()
    }
}

#[async_trait]
impl ConversationDirectory for StaticConversationDirectory {
    async fn get_conversation(&self, conversation_id: &str) -> SummaryResult<Option<ConversationInfo>> {
        Ok(self.conversations.read().await.get(conversation_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let directory = StaticConversationDirectory::new();
        assert!(directory.get_conversation("conv-1").await.unwrap().is_none());

        directory
            .register("conv-1", ConversationInfo::new("general", "C042", "slack"))
            .await;
        let info = directory.get_conversation("conv-1").await.unwrap().unwrap();
        assert_eq!(info.channel_name, "general");

        assert!(directory.remove("conv-1").await);
        assert!(directory.get_conversation("conv-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.json");
        std::fs::write(
            &path,
            r#"{"conv-1": {"channelName": "general", "channelId": "C042", "interfaceType": "slack"}}"#,
        )
        .unwrap();

        let directory = StaticConversationDirectory::from_file(&path).await.unwrap();
        let info = directory.get_conversation("conv-1").await.unwrap().unwrap();
        assert_eq!(info, ConversationInfo::new("general", "C042", "slack"));
    }

    #[tokio::test]
    async fn test_from_file_errors_are_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = StaticConversationDirectory::from_file(dir.path().join("missing.json")).await;
        assert!(matches!(missing, Err(SummaryError::Directory(_))));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let err = StaticConversationDirectory::from_file(&path).await.unwrap_err();
        assert!(matches!(err, SummaryError::Directory(_)));
        assert_eq!(err.reason(), "directory");
    }
}
