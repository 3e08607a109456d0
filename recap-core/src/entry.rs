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

//! Summary log entries
//!
//! An entry is one chronological record in a conversation's summary log: a
//! short title, a prose summary and optional structured fields. Structured
//! sequences use the empty vector for "absent", which is also how the log
//! format renders them (an empty section is simply not written).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One chronological summary record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryLogEntry {
    /// Short single-line title
    pub title: String,
    /// Prose summary, possibly extended by `UPDATE:` paragraphs
    pub content: String,
    /// When the entry was first written
    pub created: DateTime<Utc>,
    /// When the entry was last merged into (equals `created` until then)
    pub updated: DateTime<Utc>,
    /// First message index covered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<u64>,
    /// Last message index covered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_end: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_items: Vec<String>,
    /// Distinct participants, in order of first appearance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
}

impl SummaryLogEntry {
    /// Create an entry; `updated` starts equal to `created`
    pub fn new(title: impl AsRef<str>, content: impl AsRef<str>, created: DateTime<Utc>) -> Self {
        Self {
            title: normalize_title(title.as_ref()),
            content: content.as_ref().trim().to_string(),
            created,
            updated: created,
            window_start: None,
            window_end: None,
            key_points: Vec::new(),
            decisions: Vec::new(),
            action_items: Vec::new(),
            participants: Vec::new(),
        }
    }

    /// Set the message window covered by this entry
    pub fn with_window(mut self, start: u64, end: u64) -> Self {
        self.window_start = Some(start);
        self.window_end = Some(end);
        self
    }

    pub fn with_key_points(mut self, key_points: Vec<String>) -> Self {
        self.key_points = clean_items(key_points);
        self
    }

    pub fn with_decisions(mut self, decisions: Vec<String>) -> Self {
        self.decisions = clean_items(decisions);
        self
    }

    pub fn with_action_items(mut self, action_items: Vec<String>) -> Self {
        self.action_items = clean_items(action_items);
        self
    }

    /// Set participants, dropping duplicates
    pub fn with_participants(mut self, participants: Vec<String>) -> Self {
        self.participants.clear();
        self.add_participants(clean_items(participants));
        self
    }

    /// Add participants not already present, preserving first-appearance order
    pub fn add_participants<I>(&mut self, participants: I)
    where
        I: IntoIterator<Item = String>,
    {
        for participant in participants {
            if !self.participants.contains(&participant) {
                self.participants.push(participant);
            }
        }
    }

    /// Whether the entry has been merged into since creation
    pub fn is_updated(&self) -> bool {
        self.updated != self.created
    }
}

/// Collapse a title to one line of single-spaced words
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim items, drop empty ones and normalize line endings to `\n`
fn clean_items(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.replace("\r\n", "\n").replace('\r', "\n").trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_normalizes_text() {
        let now = Utc::now();
        let entry = SummaryLogEntry::new("  Release\nplanning  ", "\n Discussed dates. \n", now);

        assert_eq!(entry.title, "Release planning");
        assert_eq!(entry.content, "Discussed dates.");
        assert_eq!(entry.created, entry.updated);
        assert!(!entry.is_updated());
    }

    #[test]
    fn test_participants_are_distinct() {
        let entry = SummaryLogEntry::new("t", "c", Utc::now()).with_participants(vec![
            "alice".to_string(),
            "bob".to_string(),
            "alice".to_string(),
            " ".to_string(),
        ]);
        assert_eq!(entry.participants, vec!["alice", "bob"]);
    }

    #[test]
    fn test_list_items_use_unix_line_endings() {
        let entry = SummaryLogEntry::new("t", "c", Utc::now())
            .with_key_points(vec!["first line\r\nsecond line".to_string()])
            .with_decisions(vec!["old\rmac".to_string(), "\r\n".to_string()]);

        assert_eq!(entry.key_points, vec!["first line\nsecond line"]);
        assert_eq!(entry.decisions, vec!["old\nmac"]);
    }

    #[test]
    fn test_empty_structured_fields_are_not_serialized() {
        let entry = SummaryLogEntry::new("t", "c", Utc::now())
            .with_window(1, 20)
            .with_key_points(vec!["shipped".to_string()]);
        let json = serde_json::to_value(&entry).unwrap();

        assert!(json.get("key_points").is_some());
        assert!(json.get("decisions").is_none());
        assert_eq!(json["window_end"], 20);
    }
}
