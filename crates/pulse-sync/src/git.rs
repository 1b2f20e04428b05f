use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum GitError {
    /// The binary could not be spawned at all.
    #[error("git not available: {0}")]
    Unavailable(#[from] std::io::Error),
    /// The command ran and exited non-zero.
    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },
}

impl GitError {
    /// Diagnostic text fed to the classifier.
    pub fn diagnostic(&self) -> String {
        match self {
            GitError::Unavailable(e) => e.to_string(),
            GitError::Command { stderr, .. } => stderr.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GitError>;

/// Versioned-storage backend surface. Every operation is a black box
/// returning success or diagnostic text; no timeout is imposed beyond the
/// tool's own.
#[async_trait]
pub trait GitBackend: Send + Sync {
    /// Probe that the tool exists at all.
    async fn version(&self) -> Result<()>;
    /// Whether the working tree has uncommitted changes.
    async fn has_changes(&self, tree: &Path) -> Result<bool>;
    async fn add_all(&self, tree: &Path) -> Result<()>;
    async fn commit(&self, tree: &Path, message: &str) -> Result<()>;
    async fn push(&self, tree: &Path, remote: &str) -> Result<()>;
    /// One-time provisioning of the local working copy.
    async fn clone_into(&self, remote: &str, tree: &Path) -> Result<()>;
}

/// Runs the real `git` binary as a subprocess.
pub struct GitCli {
    bin: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            bin: PathBuf::from("git"),
        }
    }

    pub fn with_bin(bin: PathBuf) -> Self {
        Self { bin }
    }

    async fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<String> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let output = cmd.output().await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            Err(GitError::Command {
                command: args.join(" "),
                stderr: detail,
            })
        }
    }
}

#[async_trait]
impl GitBackend for GitCli {
    async fn version(&self) -> Result<()> {
        self.run(&["--version"], None).await.map(|_| ())
    }

    async fn has_changes(&self, tree: &Path) -> Result<bool> {
        let stdout = self.run(&["status", "--porcelain"], Some(tree)).await?;
        Ok(stdout.lines().any(|line| !line.trim().is_empty()))
    }

    async fn add_all(&self, tree: &Path) -> Result<()> {
        self.run(&["add", "-A"], Some(tree)).await.map(|_| ())
    }

    async fn commit(&self, tree: &Path, message: &str) -> Result<()> {
        self.run(&["commit", "-m", message], Some(tree))
            .await
            .map(|_| ())
    }

    async fn push(&self, tree: &Path, remote: &str) -> Result<()> {
        self.run(&["push", remote, "HEAD"], Some(tree))
            .await
            .map(|_| ())
    }

    async fn clone_into(&self, remote: &str, tree: &Path) -> Result<()> {
        let dest = tree.to_string_lossy();
        self.run(&["clone", remote, dest.as_ref()], None)
            .await
            .map(|_| ())
    }
}

/// Scriptable in-memory backend for tests. Results are queued per
/// operation; an empty queue means success.
#[derive(Default)]
pub struct MockGit {
    /// Answers for `has_changes`, front first. Empty queue → `false`.
    dirty: Mutex<Vec<bool>>,
    /// Failure messages for `push`, front first. `None` → success.
    push_failures: Mutex<Vec<Option<String>>>,
    /// Failure message for `commit` (applies once).
    commit_failure: Mutex<Option<String>>,
    /// When true, `version` reports the tool missing.
    unavailable: bool,
    calls: Mutex<Vec<String>>,
}

impl MockGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Queue an answer for the next `has_changes` call.
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.lock().unwrap().push(dirty);
    }

    /// Queue the next push outcome: `None` for success, `Some(stderr)` for
    /// a non-zero exit with that diagnostic.
    pub fn queue_push(&self, failure: Option<&str>) {
        self.push_failures
            .lock()
            .unwrap()
            .push(failure.map(str::to_string));
    }

    pub fn fail_next_commit(&self, stderr: &str) {
        *self.commit_failure.lock().unwrap() = Some(stderr.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn push_count(&self) -> usize {
        self.calls().iter().filter(|c| *c == "push").count()
    }

    fn record(&self, op: &str) {
        self.calls.lock().unwrap().push(op.to_string());
    }

    fn command_err(command: &str, stderr: String) -> GitError {
        GitError::Command {
            command: command.to_string(),
            stderr,
        }
    }
}

#[async_trait]
impl GitBackend for MockGit {
    async fn version(&self) -> Result<()> {
        self.record("version");
        if self.unavailable {
            return Err(GitError::Unavailable(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No such file or directory",
            )));
        }
        Ok(())
    }

    async fn has_changes(&self, _tree: &Path) -> Result<bool> {
        self.record("status");
        let mut dirty = self.dirty.lock().unwrap();
        if dirty.is_empty() {
            Ok(false)
        } else {
            Ok(dirty.remove(0))
        }
    }

    async fn add_all(&self, _tree: &Path) -> Result<()> {
        self.record("add");
        Ok(())
    }

    async fn commit(&self, _tree: &Path, _message: &str) -> Result<()> {
        self.record("commit");
        match self.commit_failure.lock().unwrap().take() {
            Some(stderr) => Err(Self::command_err("commit", stderr)),
            None => Ok(()),
        }
    }

    async fn push(&self, _tree: &Path, _remote: &str) -> Result<()> {
        self.record("push");
        let mut failures = self.push_failures.lock().unwrap();
        let next = if failures.is_empty() {
            None
        } else {
            failures.remove(0)
        };
        match next {
            Some(stderr) => Err(Self::command_err("push", stderr)),
            None => Ok(()),
        }
    }

    async fn clone_into(&self, _remote: &str, _tree: &Path) -> Result<()> {
        self.record("clone");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_defaults_to_clean_tree() {
        let git = MockGit::new();
        assert!(!git.has_changes(Path::new("/tmp")).await.unwrap());
        assert_eq!(git.calls(), vec!["status"]);
    }

    #[tokio::test]
    async fn mock_queues_push_failures_in_order() {
        let git = MockGit::new();
        git.queue_push(Some("Could not resolve host: example.com"));
        git.queue_push(None);

        let err = git.push(Path::new("/t"), "origin").await.unwrap_err();
        assert!(err.diagnostic().contains("resolve host"));
        git.push(Path::new("/t"), "origin").await.unwrap();
        assert_eq!(git.push_count(), 2);
    }

    #[tokio::test]
    async fn mock_unavailable_fails_version_probe() {
        let git = MockGit::unavailable();
        let err = git.version().await.unwrap_err();
        assert!(matches!(err, GitError::Unavailable(_)));
    }

    #[tokio::test]
    async fn real_git_reports_missing_binary() {
        let git = GitCli::with_bin(PathBuf::from("/nonexistent/definitely-not-git"));
        let err = git.version().await.unwrap_err();
        assert!(matches!(err, GitError::Unavailable(_)));
    }

    // Exercises the real subprocess path end to end when git is installed;
    // skipped silently otherwise so CI without git stays green.
    #[tokio::test]
    async fn real_git_status_detects_changes() {
        let git = GitCli::new();
        if git.version().await.is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        git.run(&["init"], Some(dir.path())).await.unwrap();
        assert!(!git.has_changes(dir.path()).await.unwrap());

        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        assert!(git.has_changes(dir.path()).await.unwrap());
    }
}
