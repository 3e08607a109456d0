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

//! Summary log text format
//!
//! Summary documents are stored as human-readable markdown. A document is a
//! front-matter header followed by the entry log, newest entry first:
//!
//! ```text
//! ---
//! conversation_id: conv-1
//! channel_name: general
//! channel_id: C042
//! interface_type: slack
//! entry_count: 1
//! total_messages: 20
//! ---
//!
//! ### [2025-02-01T10:00:00Z - Updated 2025-02-01T11:00:00Z] Release planning
//!
//! The team agreed to ship on Friday.
//!
//! UPDATE: QA signed off.
//!
//! #### Window
//! 1-40
//!
//! #### Key Points
//! - Friday release
//!
//! ---
//!
//! ```
//!
//! Content lines that would read as structure (`### [`, `#### `, `---`) and
//! lines starting with a backslash are prefixed with `\` on write and
//! unescaped on read, so any entry written here parses back unchanged.
//!
//! This format is persisted; changes must stay readable by older documents.

use recap_core::{format_timestamp, parse_timestamp, DocumentMetadata, SummaryLogEntry};

const HEADER_PREFIX: &str = "### [";
const SECTION_PREFIX: &str = "#### ";
const SEPARATOR: &str = "---";
const UPDATED_MARKER: &str = " - Updated ";
const ESCAPE: char = '\\';
const BULLET: &str = "- ";
const CONTINUATION: &str = "  ";

/// Labeled sub-sections of an entry, in write order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Window,
    KeyPoints,
    Decisions,
    ActionItems,
    Participants,
}

impl Section {
    fn label(self) -> &'static str {
        match self {
            Section::Window => "Window",
            Section::KeyPoints => "Key Points",
            Section::Decisions => "Decisions",
            Section::ActionItems => "Action Items",
            Section::Participants => "Participants",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().trim_end_matches(':').to_ascii_lowercase();
        match normalized.as_str() {
            "window" | "messages" => Some(Section::Window),
            "key points" | "keypoints" => Some(Section::KeyPoints),
            "decisions" => Some(Section::Decisions),
            "action items" | "actionitems" => Some(Section::ActionItems),
            "participants" => Some(Section::Participants),
            _ => None,
        }
    }
}

/// A stored document split into its entry log and header metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub body: String,
    pub metadata: DocumentMetadata,
    /// Whether a front-matter header was present
    pub has_header: bool,
}

/// Render entries as a log body, in the order given.
pub fn serialize_entries(entries: &[SummaryLogEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        write_entry(&mut out, entry);
    }
    out
}

fn write_entry(out: &mut String, entry: &SummaryLogEntry) {
    out.push_str(&format_header(entry));
    out.push_str("\n\n");

    for line in entry.content.split('\n') {
        if needs_escape(line) {
            out.push(ESCAPE);
        }
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');

    if entry.window_start.is_some() || entry.window_end.is_some() {
        out.push_str(SECTION_PREFIX);
        out.push_str(Section::Window.label());
        out.push('\n');
        out.push_str(&format!(
            "{}-{}\n\n",
            entry.window_start.map(|v| v.to_string()).unwrap_or_default(),
            entry.window_end.map(|v| v.to_string()).unwrap_or_default()
        ));
    }

    write_list(out, Section::KeyPoints, &entry.key_points);
    write_list(out, Section::Decisions, &entry.decisions);
    write_list(out, Section::ActionItems, &entry.action_items);
    write_list(out, Section::Participants, &entry.participants);

    out.push_str(SEPARATOR);
    out.push_str("\n\n");
}

fn format_header(entry: &SummaryLogEntry) -> String {
    if entry.created == entry.updated {
        format!("{}{}] {}", HEADER_PREFIX, format_timestamp(&entry.created), entry.title)
    } else {
        format!(
            "{}{}{}{}] {}",
            HEADER_PREFIX,
            format_timestamp(&entry.created),
            UPDATED_MARKER,
            format_timestamp(&entry.updated),
            entry.title
        )
    }
}

fn write_list(out: &mut String, section: Section, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(SECTION_PREFIX);
    out.push_str(section.label());
    out.push('\n');
    for item in items {
        let mut lines = item.split('\n');
        out.push_str(BULLET);
        out.push_str(lines.next().unwrap_or_default());
        out.push('\n');
        for line in lines {
            out.push_str(CONTINUATION);
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push('\n');
}

fn needs_escape(line: &str) -> bool {
    line.starts_with(ESCAPE) || is_structural(line) || line.starts_with(HEADER_PREFIX)
}

fn is_separator(line: &str) -> bool {
    line.trim_end() == SEPARATOR
}

fn is_structural(line: &str) -> bool {
    line.starts_with(SECTION_PREFIX) || is_separator(line)
}

fn is_blank(line: &str) -> bool {
    line.trim_end_matches('\r').is_empty()
}

/// Parse a log body back into entries.
///
/// Text before the first entry header is ignored. Entries whose header
/// timestamps cannot be read are skipped with a warning; an empty body is a
/// valid, empty log.
pub fn parse_entries(body: &str) -> Vec<SummaryLogEntry> {
    let mut entries = Vec::new();
    let mut current: Option<(&str, Vec<&str>)> = None;

    for line in body.split('\n') {
        if line.starts_with(HEADER_PREFIX) {
            if let Some((header, lines)) = current.take() {
                entries.extend(parse_block(header, &lines));
            }
            current = Some((line, Vec::new()));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some((header, lines)) = current {
        entries.extend(parse_block(header, &lines));
    }

    entries
}

fn parse_block(header: &str, lines: &[&str]) -> Option<SummaryLogEntry> {
    let Some((created, updated, title)) = parse_header(header) else {
        tracing::warn!(header = %header, "Skipping summary entry with unreadable header");
        return None;
    };

    let mut idx = 0;
    if lines.first().is_some_and(|l| is_blank(l)) {
        idx = 1;
    }

    let mut content_lines = Vec::new();
    while idx < lines.len() && !is_structural(lines[idx]) {
        content_lines.push(lines[idx]);
        idx += 1;
    }
    if content_lines.last().is_some_and(|l| is_blank(l)) {
        content_lines.pop();
    }
    let content = content_lines
        .iter()
        .map(|&line| line.strip_prefix(ESCAPE).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n");

    let mut entry = SummaryLogEntry {
        title,
        content,
        created,
        updated,
        window_start: None,
        window_end: None,
        key_points: Vec::new(),
        decisions: Vec::new(),
        action_items: Vec::new(),
        participants: Vec::new(),
    };

    while idx < lines.len() {
        let line = lines[idx];
        if is_separator(line) {
            break;
        }
        idx += 1;
        if let Some(label) = line.strip_prefix(SECTION_PREFIX) {
            let start = idx;
            while idx < lines.len() && !is_structural(lines[idx]) {
                idx += 1;
            }
            match Section::from_label(label.trim_end_matches('\r')) {
                Some(section) => apply_section(&mut entry, section, &lines[start..idx]),
                None => tracing::debug!(label = %label.trim(), "Ignoring unknown entry section"),
            }
        }
    }

    Some(entry)
}

fn parse_header(line: &str) -> Option<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>, String)> {
    let rest = line.strip_prefix(HEADER_PREFIX)?;
    let close = rest.find(']')?;
    let span = &rest[..close];
    let title = rest[close + 1..].trim().to_string();

    let (created_raw, updated_raw) = match span.split_once(UPDATED_MARKER) {
        Some((created, updated)) => (created, Some(updated)),
        None => (span, None),
    };
    let created = parse_timestamp(created_raw)?;
    let updated = match updated_raw {
        Some(raw) => parse_timestamp(raw)?,
        None => created,
    };

    Some((created, updated, title))
}

fn apply_section(entry: &mut SummaryLogEntry, section: Section, lines: &[&str]) {
    match section {
        Section::Window => {
            if let Some(line) = lines.iter().find(|l| !is_blank(l)) {
                let (start, end) = parse_window(line.trim());
                entry.window_start = start;
                entry.window_end = end;
            }
        }
        Section::KeyPoints => entry.key_points = parse_items(lines),
        Section::Decisions => entry.decisions = parse_items(lines),
        Section::ActionItems => entry.action_items = parse_items(lines),
        Section::Participants => entry.add_participants(parse_items(lines)),
    }
}

fn parse_window(raw: &str) -> (Option<u64>, Option<u64>) {
    match raw.split_once('-') {
        Some((start, end)) => (start.trim().parse().ok(), end.trim().parse().ok()),
        None => (raw.parse().ok(), None),
    }
}

fn parse_items(lines: &[&str]) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for raw in lines {
        let line = raw.trim_end_matches('\r');
        if let Some(item) = line.strip_prefix(BULLET).or_else(|| line.strip_prefix("* ")) {
            items.push(item.to_string());
        } else if line == "-" {
            items.push(String::new());
        } else if let Some(rest) = line.strip_prefix(CONTINUATION) {
            if let Some(last) = items.last_mut() {
                last.push('\n');
                last.push_str(rest);
            }
        }
    }
    items
}

/// Wrap a log body in a metadata header.
pub fn build_document(body: &str, metadata: &DocumentMetadata) -> String {
    let mut out = String::from(SEPARATOR);
    out.push('\n');
    push_field(&mut out, "conversation_id", &metadata.conversation_id);
    push_field(&mut out, "channel_name", &metadata.channel_name);
    push_field(&mut out, "channel_id", &metadata.channel_id);
    push_field(&mut out, "interface_type", &metadata.interface_type);
    push_field(&mut out, "entry_count", &metadata.entry_count.to_string());
    push_field(&mut out, "total_messages", &metadata.total_messages.to_string());
    out.push_str(SEPARATOR);
    out.push_str("\n\n");
    out.push_str(body);
    out
}

fn push_field(out: &mut String, key: &str, value: &str) {
    let value = value.replace(['\r', '\n'], " ");
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value.trim());
    out.push('\n');
}

/// Split stored document text into its metadata and entry log.
///
/// Never fails: text without a header yields default metadata and the whole
/// text as body. Older documents that kept `Key: value` lines in the body
/// before the first entry have those lines read as metadata.
pub fn parse_document(text: &str) -> ParsedDocument {
    if let Some((header, body)) = split_front_matter(text) {
        let mut metadata = DocumentMetadata::default();
        for line in header.lines() {
            apply_metadata_line(&mut metadata, line, false);
        }
        return ParsedDocument {
            body: body.to_string(),
            metadata,
            has_header: true,
        };
    }

    let mut metadata = DocumentMetadata::default();
    for line in text.lines().take_while(|l| !l.starts_with(HEADER_PREFIX)) {
        apply_metadata_line(&mut metadata, line, true);
    }
    ParsedDocument {
        body: text.to_string(),
        metadata,
        has_header: false,
    }
}

fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if is_separator(line) {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let body = body
                .strip_prefix("\r\n")
                .or_else(|| body.strip_prefix('\n'))
                .unwrap_or(body);
            return Some((header, body));
        }
        offset += line.len();
    }
    None
}

/// Read one `key: value` line into `metadata`.
///
/// Legacy in-body lines may carry markdown bold (`**Key:** value`), which is
/// stripped; front-matter values are taken verbatim.
fn apply_metadata_line(metadata: &mut DocumentMetadata, line: &str, legacy: bool) {
    let Some((key, value)) = line.split_once(':') else {
        return;
    };
    let key: String = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let value = if legacy {
        value.trim().trim_matches('*').trim()
    } else {
        value.trim()
    };

    match key.as_str() {
        "conversationid" => metadata.conversation_id = value.to_string(),
        "channelname" => metadata.channel_name = value.to_string(),
        "channelid" => metadata.channel_id = value.to_string(),
        "interfacetype" => metadata.interface_type = value.to_string(),
        "entrycount" => metadata.entry_count = value.parse().unwrap_or_default(),
        "totalmessages" => metadata.total_messages = value.parse().unwrap_or_default(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, hour, 0, 0).unwrap()
    }

    fn rich_entry() -> SummaryLogEntry {
        let mut entry = SummaryLogEntry::new(
            "Release planning",
            "The team agreed to ship on Friday.",
            at(10),
        )
        .with_window(1, 20)
        .with_key_points(vec!["Friday release".into(), "QA owns sign-off".into()])
        .with_decisions(vec!["Ship v2.1".into()])
        .with_action_items(vec!["Alice drafts notes".into()])
        .with_participants(vec!["alice".into(), "bob".into()]);
        entry.updated = at(11);
        entry
    }

    #[test]
    fn test_serialize_header_forms() {
        let fresh = SummaryLogEntry::new("Kickoff", "Hello", at(9));
        let text = serialize_entries(&[fresh]);
        assert!(text.starts_with("### [2025-02-01T09:00:00Z] Kickoff\n\nHello\n\n---\n"));

        let text = serialize_entries(&[rich_entry()]);
        assert!(text.starts_with(
            "### [2025-02-01T10:00:00Z - Updated 2025-02-01T11:00:00Z] Release planning\n"
        ));
        assert!(text.contains("#### Key Points\n- Friday release\n- QA owns sign-off\n"));
        assert!(text.contains("#### Window\n1-20\n"));
        assert!(!text.contains("#### Action Items\n\n"));
    }

    #[test]
    fn test_round_trip_preserves_order_and_fields() {
        let older = SummaryLogEntry::new("Kickoff", "Introductions.", at(8)).with_window(1, 5);
        let newer = rich_entry();
        let entries = vec![newer, older];

        let parsed = parse_entries(&serialize_entries(&entries));
        assert_eq!(parsed, entries);
    }

    #[test]
    fn test_round_trip_merged_content_and_escapes() {
        let mut entry = SummaryLogEntry::new("Tricky", "A", at(8));
        entry.content = "A\n\n---\n### [not a header]\n#### Key Points\n\\path\n\nUPDATE: ".into();
        entry.key_points = vec!["line one\nline two\n\nline four".into()];
        entry.updated = at(8) + Duration::milliseconds(1500);

        let parsed = parse_entries(&serialize_entries(&[entry.clone()]));
        assert_eq!(parsed, vec![entry]);
    }

    #[test]
    fn test_round_trip_crlf_items_from_model_output() {
        let entry = SummaryLogEntry::new("Drafted", "line one\r\nline two", at(8))
            .with_key_points(vec!["first line\r\nsecond line".into()])
            .with_action_items(vec!["carriage\rreturn".into()])
            .with_participants(vec!["alice\r\n".into()]);

        let parsed = parse_entries(&serialize_entries(&[entry.clone()]));
        assert_eq!(parsed, vec![entry]);
        assert_eq!(parsed[0].key_points, vec!["first line\nsecond line"]);
    }

    #[test]
    fn test_empty_log_and_missing_sections() {
        assert!(parse_entries("").is_empty());
        assert!(parse_entries("\n\n").is_empty());

        let parsed = parse_entries("### [2025-02-01T09:00:00Z] Bare\nJust prose\n---\n");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].title, "Bare");
        assert_eq!(parsed[0].content, "Just prose");
        assert!(parsed[0].key_points.is_empty());
        assert_eq!(parsed[0].window_start, None);
    }

    #[test]
    fn test_unreadable_header_is_skipped() {
        let body = "### [last tuesday] Broken\nx\n---\n\n### [2025-02-01T09:00:00Z] Good\n\ny\n\n---\n";
        let parsed = parse_entries(body);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].title, "Good");
    }

    #[test]
    fn test_legacy_entry_layout() {
        let body = "### [2024-11-05 08:15 - Updated 2024-11-05 09:00] Old format\r\n\
                    Some text\r\n\
                    #### Participants\r\n\
                    * alice\r\n\
                    * alice\r\n\
                    ---\r\n";
        let parsed = parse_entries(body);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].title, "Old format");
        assert_eq!(parsed[0].content, "Some text\r");
        assert_eq!(parsed[0].participants, vec!["alice"]);
        assert!(parsed[0].is_updated());
    }

    #[test]
    fn test_document_round_trip() {
        let metadata = DocumentMetadata {
            conversation_id: "conv-1".into(),
            channel_name: "general".into(),
            channel_id: "C042".into(),
            interface_type: "slack".into(),
            entry_count: 1,
            total_messages: 20,
        };
        let body = serialize_entries(&[rich_entry()]);
        let text = build_document(&body, &metadata);

        assert!(text.starts_with("---\nconversation_id: conv-1\n"));
        let parsed = parse_document(&text);
        assert!(parsed.has_header);
        assert_eq!(parsed.metadata, metadata);
        assert_eq!(parsed.body, body);
    }

    #[test]
    fn test_front_matter_values_keep_asterisks() {
        let metadata = DocumentMetadata {
            conversation_id: "conv-*".into(),
            channel_name: "*announcements*".into(),
            ..DocumentMetadata::default()
        };
        let parsed = parse_document(&build_document("", &metadata));
        assert_eq!(parsed.metadata, metadata);
    }

    #[test]
    fn test_document_without_header() {
        let body = serialize_entries(&[rich_entry()]);
        let parsed = parse_document(&body);
        assert!(!parsed.has_header);
        assert_eq!(parsed.metadata, DocumentMetadata::default());
        assert_eq!(parsed.body, body);

        let parsed = parse_document("");
        assert_eq!(parsed.body, "");
        assert!(parse_entries(&parsed.body).is_empty());
    }

    #[test]
    fn test_legacy_in_body_metadata() {
        let text = "# Conversation Summary\n\
                    **Conversation ID:** conv-9\n\
                    Channel Name: random\n\
                    Total Messages: 60\n\n\
                    ### [2025-02-01T09:00:00Z] Entry\n\nBody\n\n---\n";
        let parsed = parse_document(text);
        assert!(!parsed.has_header);
        assert_eq!(parsed.metadata.conversation_id, "conv-9");
        assert_eq!(parsed.metadata.channel_name, "random");
        assert_eq!(parsed.metadata.total_messages, 60);
        assert_eq!(parse_entries(&parsed.body).len(), 1);
    }

    #[test]
    fn test_unterminated_header_is_body() {
        let parsed = parse_document("---\nconversation_id: x\n");
        assert!(!parsed.has_header);
        assert_eq!(parsed.body, "---\nconversation_id: x\n");
    }
}
