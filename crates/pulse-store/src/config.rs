use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Floor applied to `flush_interval_minutes` regardless of the stored value.
pub const MIN_FLUSH_INTERVAL_MINUTES: u64 = 5;

/// User configuration, stored as pretty JSON at `<store>/config.json`.
///
/// Loading never fails: a missing or unparseable file yields defaults.
/// Unknown keys round-trip through save so a newer pulse does not eat an
/// older one's settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PulseConfig {
    /// Master switch for aggregation and flushing.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Gates info/warning notifications. Transient status lines always show.
    #[serde(default = "default_true")]
    pub notifications: bool,
    /// Git remote URL. Absent means sync is unconfigured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(default = "default_true")]
    pub sync_enabled: bool,
    #[serde(default = "default_flush_interval")]
    pub flush_interval_minutes: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

fn default_flush_interval() -> u64 {
    MIN_FLUSH_INTERVAL_MINUTES
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            notifications: true,
            remote_url: None,
            sync_enabled: true,
            flush_interval_minutes: default_flush_interval(),
            extra: serde_json::Map::new(),
        }
    }
}

impl PulseConfig {
    /// Load from `config.json`. Returns defaults if the file is missing or
    /// unparseable.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Persist as pretty JSON via atomic write.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        crate::write_atomic(path, json.as_bytes())
    }

    /// Effective flush period, with the 5-minute floor applied.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_minutes.max(MIN_FLUSH_INTERVAL_MINUTES) * 60)
    }

    /// The configured remote, trimmed; `None` when unset or blank.
    pub fn remote(&self) -> Option<&str> {
        self.remote_url
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    /// Whether a sync should be attempted after a flush.
    pub fn sync_target(&self) -> Option<&str> {
        if self.sync_enabled {
            self.remote()
        } else {
            None
        }
    }
}
