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

//! Summary system error types

use recap_core::ValidationError;
use thiserror::Error;

/// Result type for summary operations
pub type SummaryResult<T> = Result<T, SummaryError>;

/// Errors surfaced to callers of the digest pipeline
///
/// Model failures never appear here: the decision engine recovers from them
/// with a deterministic fallback entry.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Digest failed structural validation
    #[error("Invalid digest: {0}")]
    InvalidDigest(#[from] ValidationError),

    /// Conversation directory has no record of the conversation
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// Conversation directory could not be queried
    #[error("Conversation directory error: {0}")]
    Directory(String),

    /// Document store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SummaryError {
    fn from(e: serde_json::Error) -> Self {
        SummaryError::Serialization(e.to_string())
    }
}

impl SummaryError {
    /// Short machine-readable label, used as a metric attribute
    pub fn reason(&self) -> &'static str {
        match self {
            SummaryError::InvalidDigest(_) => "invalid_digest",
            SummaryError::ConversationNotFound(_) => "conversation_not_found",
            SummaryError::Directory(_) => "directory",
            SummaryError::Storage(_) => "storage",
            SummaryError::Serialization(_) => "serialization",
            SummaryError::Config(_) => "config",
            SummaryError::Io(_) => "io",
        }
    }
}
