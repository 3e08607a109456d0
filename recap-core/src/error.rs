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

//! Validation errors for inbound data

use thiserror::Error;

/// Reasons a digest is rejected before processing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Digest did not name a conversation
    #[error("Conversation id must not be empty")]
    EmptyConversationId,

    /// Window indices are 1-based
    #[error("Window start must be at least 1, got {0}")]
    ZeroWindowStart(u64),

    /// Window start after window end
    #[error("Window start {start} is after window end {end}")]
    InvertedWindow { start: u64, end: u64 },
}
