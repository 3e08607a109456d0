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

//! Entry merging
//!
//! Combines a freshly drafted entry with the existing log. Pure: no I/O and
//! no failure modes.

use crate::decision::SummaryDecision;
use recap_core::SummaryLogEntry;

/// Marker separating merged paragraphs in an entry's content
pub const UPDATE_SEPARATOR: &str = "\n\nUPDATE: ";

/// Fold `new_entry` into `existing` (newest first).
///
/// With `should_update` and an in-range `update_index` the target entry is
/// extended in place and the length is unchanged. Otherwise the new entry is
/// prepended, including when the index is missing or out of range.
pub fn manage_entries(
    existing: Vec<SummaryLogEntry>,
    new_entry: SummaryLogEntry,
    should_update: bool,
    update_index: Option<usize>,
) -> Vec<SummaryLogEntry> {
    let target = update_index.filter(|&index| should_update && index < existing.len());

    let mut entries = existing;
    match target {
        Some(index) => {
            merge_into(&mut entries[index], new_entry);
        }
        None => {
            if should_update {
                tracing::debug!(
                    update_index = ?update_index,
                    entries = entries.len(),
                    "Update target out of range, prepending instead"
                );
            }
            entries.insert(0, new_entry);
        }
    }
    entries
}

/// Apply a decision to the existing log.
pub fn apply_decision(
    existing: Vec<SummaryLogEntry>,
    decision: SummaryDecision,
) -> Vec<SummaryLogEntry> {
    match decision {
        SummaryDecision::Update { index, entry } => manage_entries(existing, entry, true, Some(index)),
        SummaryDecision::Create { entry } | SummaryDecision::Append { entry } => {
            manage_entries(existing, entry, false, None)
        }
    }
}

fn merge_into(target: &mut SummaryLogEntry, new_entry: SummaryLogEntry) {
    target.content = format!("{}{}{}", target.content, UPDATE_SEPARATOR, new_entry.content);
    target.updated = new_entry.created;

    if new_entry.window_end.is_some() {
        target.window_end = new_entry.window_end;
    }
    if target.window_start.is_none() {
        target.window_start = new_entry.window_start;
    }

    target.key_points.extend(new_entry.key_points);
    target.decisions.extend(new_entry.decisions);
    target.action_items.extend(new_entry.action_items);
    target.add_participants(new_entry.participants);
}
