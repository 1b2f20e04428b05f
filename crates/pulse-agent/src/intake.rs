//! The stdin bridge: the host editor pipes newline-delimited JSON into
//! `pulse run`. Each line is an edit event or a control record; malformed
//! lines are skipped, never fatal.

use pulse_core::EditEvent;
use serde::Deserialize;

/// One line of the bridge protocol.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BridgeLine {
    /// A document change.
    Edit(EditEvent),
    /// Manual "force snapshot now" trigger.
    Flush,
    /// Request a commit+push immediately.
    Sync,
}

/// Parse a bridge line. Empty lines and malformed JSON yield `None`.
pub fn parse_line(line: &str) -> Option<BridgeLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::debug!(error = %e, "skipping malformed bridge line");
            None
        }
    }
}

/// Status-bar text shown after each recorded edit.
pub fn status_line(files: usize, lines: u64) -> String {
    format!("pulse: {files} files · {lines} lines")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_edit_event() {
        let line = r#"{"kind":"edit","path":"/src/main.rs","language":"rust","changes":[{"inserted_lines":3,"removed_lines":1}]}"#;
        match parse_line(line) {
            Some(BridgeLine::Edit(event)) => {
                assert_eq!(event.path, "/src/main.rs");
                assert_eq!(event.language, "rust");
                assert_eq!(event.changes.len(), 1);
                assert!(event.is_local_file());
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn parses_control_records() {
        assert_eq!(parse_line(r#"{"kind":"flush"}"#), Some(BridgeLine::Flush));
        assert_eq!(parse_line(r#"{"kind":"sync"}"#), Some(BridgeLine::Sync));
    }

    #[test]
    fn skips_blank_and_malformed_lines() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("not json"), None);
        assert_eq!(parse_line(r#"{"kind":"unknown"}"#), None);
        assert_eq!(parse_line(r#"{"kind":"edit"}"#), None); // missing path
    }

    #[test]
    fn status_line_format() {
        assert_eq!(status_line(3, 42), "pulse: 3 files · 42 lines");
    }
}
