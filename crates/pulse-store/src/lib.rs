use fs2::FileExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;

pub mod config;

pub use config::PulseConfig;

/// Return the per-user store root: `~/.local/share/pulse` (platform data
/// dir), falling back to `~/.pulse`, then `./.pulse-store`.
pub fn store_root() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("pulse")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".pulse")
    } else {
        PathBuf::from(".pulse-store")
    }
}

/// All well-known paths under the store root.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub root: PathBuf,
    pub config_json: PathBuf,
    pub lock_file: PathBuf,
    /// Local working copy of the synchronized remote store.
    pub tree_dir: PathBuf,
    /// Snapshot hierarchy inside the working tree.
    pub activity_dir: PathBuf,
}

impl StorePaths {
    /// Derive all paths from a store root. Pure computation, no I/O.
    pub fn discover(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let tree_dir = root.join("tree");
        Self {
            config_json: root.join("config.json"),
            lock_file: root.join("LOCK"),
            activity_dir: tree_dir.join("activity"),
            tree_dir,
            root,
        }
    }

    /// Paths under the default per-user root.
    pub fn default_store() -> Self {
        Self::discover(store_root())
    }

    /// Create the store directories. Idempotent.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        for dir in [&self.root, &self.tree_dir, &self.activity_dir] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Check whether the store has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.root.is_dir()
    }

    /// Absolute write target for a snapshot taken at `at`.
    pub fn snapshot_path(&self, at: OffsetDateTime) -> PathBuf {
        self.activity_dir.join(pulse_core::snapshot_rel_path(at))
    }

    /// Most recent snapshot file under `activity/`, by path order (the
    /// hierarchy sorts chronologically). `None` when no snapshot exists.
    pub fn latest_snapshot(&self) -> Option<PathBuf> {
        fn newest_entry(dir: &Path) -> Option<PathBuf> {
            let mut entries: Vec<PathBuf> = fs::read_dir(dir)
                .ok()?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .collect();
            entries.sort();
            entries.pop()
        }

        let mut cur = self.activity_dir.clone();
        // year/month/day directories, then the file
        for _ in 0..3 {
            cur = newest_entry(&cur)?;
            if !cur.is_dir() {
                return None;
            }
        }
        newest_entry(&cur)
    }
}

/// Atomic write: write to a temp file in the same dir, then rename.
/// Creates parent directories as needed.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// File-based exclusive lock guard. Held by a running daemon so a second
/// instance cannot race the same working tree.
pub struct LockGuard {
    _file: fs::File,
}

/// Acquire an exclusive file lock. Creates the lock file if needed.
pub fn lock_file(path: &Path) -> anyhow::Result<LockGuard> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    file.try_lock_exclusive()
        .map_err(|_| anyhow::anyhow!("store is locked by another pulse process"))?;
    Ok(LockGuard { _file: file })
}
