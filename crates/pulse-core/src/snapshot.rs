use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::activity::ActivityDrain;

/// Immutable record of aggregated activity produced at one flush instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    /// RFC 3339 date-time of the flush moment.
    pub timestamp: String,
    /// Count of distinct files touched since the previous flush.
    pub files_touched: usize,
    /// Sorted distinct language identifiers.
    pub languages: Vec<String>,
    /// Total line churn.
    pub lines_changed: u64,
}

impl Snapshot {
    /// Build a snapshot from drained activity at the given instant.
    pub fn from_drain(drain: &ActivityDrain, at: OffsetDateTime) -> Self {
        Self {
            timestamp: at.format(&Rfc3339).unwrap_or_default(),
            files_touched: drain.files.len(),
            languages: drain.languages.iter().cloned().collect(),
            lines_changed: drain.lines_changed,
        }
    }
}

/// Relative storage path for a snapshot taken at `at`:
/// `YYYY/MM/DD/HH-MM-SS.json`. Second granularity; two flushes inside the
/// same second collapse to last-write-wins.
pub fn snapshot_rel_path(at: OffsetDateTime) -> PathBuf {
    PathBuf::from(format!(
        "{:04}/{:02}/{:02}/{:02}-{:02}-{:02}.json",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn ts(s: &str) -> OffsetDateTime {
        OffsetDateTime::parse(s, &Rfc3339).unwrap()
    }

    fn drain() -> ActivityDrain {
        let mut files = BTreeSet::new();
        files.insert("/a.rs".to_string());
        files.insert("/b.rs".to_string());
        let mut languages = BTreeSet::new();
        languages.insert("rust".to_string());
        ActivityDrain {
            files,
            languages,
            lines_changed: 7,
        }
    }

    #[test]
    fn from_drain_counts_and_timestamp() {
        let at = ts("2026-08-04T09:15:42Z");
        let snap = Snapshot::from_drain(&drain(), at);
        assert_eq!(snap.timestamp, "2026-08-04T09:15:42Z");
        assert_eq!(snap.files_touched, 2);
        assert_eq!(snap.languages, vec!["rust".to_string()]);
        assert_eq!(snap.lines_changed, 7);
    }

    #[test]
    fn rel_path_is_zero_padded_hierarchy() {
        let at = ts("2026-01-05T03:07:09Z");
        assert_eq!(
            snapshot_rel_path(at),
            PathBuf::from("2026/01/05/03-07-09.json")
        );
    }

    #[test]
    fn same_second_yields_same_path() {
        let a = ts("2026-08-04T12:00:00Z");
        let b = ts("2026-08-04T12:00:00.999Z");
        assert_eq!(snapshot_rel_path(a), snapshot_rel_path(b));
    }

    #[test]
    fn snapshot_round_trip_json() {
        let at = ts("2026-08-04T09:15:42Z");
        let snap = Snapshot::from_drain(&drain(), at);
        let json = serde_json::to_string_pretty(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
