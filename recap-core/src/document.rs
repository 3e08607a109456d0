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

//! Persisted summary documents
//!
//! # Key Encoding
//!
//! - Document kind: `conversation-summary`
//! - Document id: `summary-{conversation_id}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel details for a conversation, as reported by the conversation directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationInfo {
    pub channel_name: String,
    pub channel_id: String,
    /// Interface the conversation happens on, e.g. `slack` or `web`
    pub interface_type: String,
}

impl ConversationInfo {
    pub fn new(
        channel_name: impl Into<String>,
        channel_id: impl Into<String>,
        interface_type: impl Into<String>,
    ) -> Self {
        Self {
            channel_name: channel_name.into(),
            channel_id: channel_id.into(),
            interface_type: interface_type.into(),
        }
    }
}

/// Metadata carried in a summary document's header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub conversation_id: String,
    pub channel_name: String,
    pub channel_id: String,
    pub interface_type: String,
    /// Number of entries in the log
    pub entry_count: usize,
    /// Highest message index summarized so far
    pub total_messages: u64,
}

impl DocumentMetadata {
    /// Metadata for a conversation with the given channel details
    pub fn for_conversation(conversation_id: impl Into<String>, info: &ConversationInfo) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            channel_name: info.channel_name.clone(),
            channel_id: info.channel_id.clone(),
            interface_type: info.interface_type.clone(),
            entry_count: 0,
            total_messages: 0,
        }
    }
}

/// The persisted, one-per-conversation summary log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryDocument {
    /// Entity type in the document store
    pub kind: String,
    /// Deterministic id derived from the conversation id
    pub id: String,
    /// Full document text: metadata header followed by the entry log
    pub content: String,
    /// When the first entry was written; never changes
    pub created: DateTime<Utc>,
    /// Timestamp of the most recent digest processed
    pub updated: DateTime<Utc>,
    pub metadata: DocumentMetadata,
}

impl SummaryDocument {
    /// Store kind for conversation summaries
    pub const KIND: &'static str = "conversation-summary";

    /// Document id for a conversation
    pub fn id_for(conversation_id: &str) -> String {
        format!("summary-{}", conversation_id)
    }

    /// Create a summary document for a conversation
    pub fn new(
        metadata: DocumentMetadata,
        content: String,
        created: DateTime<Utc>,
        updated: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            id: Self::id_for(&metadata.conversation_id),
            content,
            created,
            updated,
            metadata,
        }
    }
}
