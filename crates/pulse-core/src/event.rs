use serde::{Deserialize, Serialize};

/// One content change inside an edit event: line counts for the inserted
/// text and the replaced range, as computed by the host editor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentChange {
    #[serde(default)]
    pub inserted_lines: u64,
    #[serde(default)]
    pub removed_lines: u64,
}

impl ContentChange {
    /// Line churn contributed by this change.
    pub fn line_delta(&self) -> u64 {
        self.inserted_lines.abs_diff(self.removed_lines)
    }
}

/// A document-change record from the host editor bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditEvent {
    /// Absolute path of the edited document.
    pub path: String,
    /// URI scheme of the document source. Only `file` documents are
    /// aggregated; everything else (untitled buffers, virtual docs) is
    /// dropped by the intake layer.
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Editor language identifier (e.g. "rust", "markdown").
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub changes: Vec<ContentChange>,
}

fn default_scheme() -> String {
    "file".to_string()
}

impl EditEvent {
    /// Whether this event comes from an on-disk file.
    pub fn is_local_file(&self) -> bool {
        self.scheme == "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_delta_is_absolute() {
        let grow = ContentChange {
            inserted_lines: 5,
            removed_lines: 0,
        };
        let shrink = ContentChange {
            inserted_lines: 0,
            removed_lines: 2,
        };
        let replace = ContentChange {
            inserted_lines: 3,
            removed_lines: 3,
        };
        assert_eq!(grow.line_delta(), 5);
        assert_eq!(shrink.line_delta(), 2);
        assert_eq!(replace.line_delta(), 0);
    }

    #[test]
    fn deserialize_defaults_scheme_to_file() {
        let json = r#"{"path":"/src/main.rs","language":"rust","changes":[]}"#;
        let event: EditEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.scheme, "file");
        assert!(event.is_local_file());
    }

    #[test]
    fn non_file_scheme_is_not_local() {
        let json = r#"{"path":"untitled:Untitled-1","scheme":"untitled"}"#;
        let event: EditEvent = serde_json::from_str(json).unwrap();
        assert!(!event.is_local_file());
        assert!(event.changes.is_empty());
    }

    #[test]
    fn round_trip_serialize() {
        let event = EditEvent {
            path: "/src/lib.rs".into(),
            scheme: "file".into(),
            language: "rust".into(),
            changes: vec![ContentChange {
                inserted_lines: 2,
                removed_lines: 1,
            }],
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: EditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
