//! Parsing and rewriting of schedule file text.
//!
//! A managed entry occupies exactly two consecutive lines: the marker comment
//! and the entry line. The rewrite functions copy every other line verbatim,
//! so foreign content (hand-written entries, blank lines, unrelated comments)
//! keeps its bytes and relative order. A marker that is the final line of the
//! file has no entry line to pair with; parsing drops it and the rewrite
//! functions copy it through as foreign content.

use crate::MARKER_PREFIX;

/// One managed entry recovered from a schedule file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronEntry {
    pub name: String,
    pub line: String,
}

/// Renders the marker comment for the given entry name.
pub fn marker_line(name: &str) -> String {
    format!("{MARKER_PREFIX}{name}")
}

/// Splits file content into lines without touching any bytes inside them.
///
/// A trailing terminator does not produce an empty final line.
fn split_lines(content: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = content.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

/// Scans the content for managed entries, in file order.
///
/// Duplicate names are all reported; callers that need a single authoritative
/// entry take the first occurrence.
pub fn parse_entries(content: &str) -> Vec<CronEntry> {
    let lines = split_lines(content);
    let mut entries = Vec::new();
    let mut index = 0;
    while index < lines.len() {
        if let Some(name) = lines[index].strip_prefix(MARKER_PREFIX) {
            let Some(line) = lines.get(index + 1) else {
                // Orphan marker at end of input.
                break;
            };
            entries.push(CronEntry {
                name: name.to_string(),
                line: (*line).to_string(),
            });
            index += 2;
        } else {
            index += 1;
        }
    }
    entries
}

/// Appends a new managed pair at the end of the content.
pub fn append_entry(content: &str, name: &str, line: &str) -> String {
    let mut out = content.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&marker_line(name));
    out.push('\n');
    out.push_str(line);
    out.push('\n');
    out
}

/// Rewrites every managed pair matching `name` with a new entry line.
pub fn replace_entry(content: &str, name: &str, line: &str) -> String {
    rewrite_entries(content, name, Some(line))
}

/// Drops every managed pair matching `name`.
pub fn remove_entry(content: &str, name: &str) -> String {
    rewrite_entries(content, name, None)
}

/// Full rewrite pass shared by update and remove.
///
/// Copies every line verbatim except matching (marker, entry) pairs, which
/// are replaced or dropped. The scan revisits the whole file, so duplicate
/// markers are all rewritten. Output lines each end with exactly one
/// terminator; empty output is the empty string.
fn rewrite_entries(content: &str, name: &str, replacement: Option<&str>) -> String {
    let marker = marker_line(name);
    let lines = split_lines(content);
    let mut out = String::with_capacity(content.len());
    let mut index = 0;
    while index < lines.len() {
        let line = lines[index];
        if line == marker && index + 1 < lines.len() {
            if let Some(new_line) = replacement {
                out.push_str(&marker);
                out.push('\n');
                out.push_str(new_line);
                out.push('\n');
            }
            index += 2;
            continue;
        }
        out.push_str(line);
        out.push('\n');
        index += 1;
    }
    out
}
