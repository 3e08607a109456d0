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

//! Recap Core
//!
//! Shared data model for digest-driven conversation summaries:
//! - **Digests**: bounded windows of new conversation messages
//! - **Log entries**: one chronological summary record each
//! - **Documents**: the persisted, one-per-conversation summary log
//!
//! Timestamps are UTC and rendered as RFC 3339 with only as many fractional
//! digits as needed, so they survive a text round-trip unchanged.

pub mod digest;
pub mod document;
pub mod entry;
pub mod error;

pub use digest::{ConversationDigest, DigestMessage};
pub use document::{ConversationInfo, DocumentMetadata, SummaryDocument};
pub use entry::SummaryLogEntry;
pub use error::ValidationError;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Render a timestamp the way it is stored in summary logs.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a timestamp from a summary log.
///
/// Accepts RFC 3339 and, for logs written by older tooling, naive
/// `YYYY-MM-DD HH:MM[:SS]` values which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
