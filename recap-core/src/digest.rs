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

//! Conversation digests
//!
//! A digest is the notification that a window of new messages is ready to be
//! folded into a conversation's summary. Digests arrive as camelCase JSON
//! from the message bus.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single message carried by a digest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestMessage {
    pub id: String,
    pub conversation_id: String,
    /// Speaker role, e.g. `user` or `assistant`
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A bounded window of new messages for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDigest {
    pub conversation_id: String,
    /// Total messages in the conversation when the digest was cut
    pub message_count: u64,
    pub window_size: u64,
    /// First message index in the window (1-based, inclusive)
    pub window_start: u64,
    /// Last message index in the window (1-based, inclusive)
    pub window_end: u64,
    pub messages: Vec<DigestMessage>,
    /// When the digest was created
    pub timestamp: DateTime<Utc>,
}

impl ConversationDigest {
    /// Create an empty digest for a window
    pub fn new(conversation_id: impl Into<String>, window_start: u64, window_end: u64) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message_count: window_end,
            window_size: window_end.saturating_sub(window_start) + 1,
            window_start,
            window_end,
            messages: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Append a message to the window
    pub fn message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        let index = self.window_start + self.messages.len() as u64;
        self.messages.push(DigestMessage {
            id: format!("{}-{}", self.conversation_id, index),
            conversation_id: self.conversation_id.clone(),
            role: role.into(),
            content: content.into(),
            timestamp: self.timestamp,
            metadata: None,
        });
        self
    }

    /// Set the digest creation time
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Check the structural invariants of the digest
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.conversation_id.trim().is_empty() {
            return Err(ValidationError::EmptyConversationId);
        }
        if self.window_start == 0 {
            return Err(ValidationError::ZeroWindowStart(self.window_start));
        }
        if self.window_start > self.window_end {
            return Err(ValidationError::InvertedWindow {
                start: self.window_start,
                end: self.window_end,
            });
        }
        Ok(())
    }

    /// Render the window as `role: content` lines
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
