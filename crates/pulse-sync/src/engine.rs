//! Commit/push orchestration as a single-owner worker task.
//!
//! The worker owns all sync state; the scheduler and the config reloader
//! talk to it through [`SyncHandle`]. Attempts run as spawned tasks so the
//! worker stays responsive while git is busy; their results come back as
//! messages stamped with the generation they were born under, and a stale
//! generation means the result is discarded without touching state.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::classify::classify;
use crate::git::{GitBackend, GitError};

/// Commit message used for every snapshot batch.
pub const COMMIT_MESSAGE: &str = "pulse activity snapshot";

/// Cadence of the retry driver. Constant, no backoff.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Commands accepted by the sync worker.
#[derive(Debug)]
pub enum SyncCommand {
    /// Commit local changes and push. No-op while an attempt is in flight.
    Commit,
    /// The remote target changed: bump the generation, drop retry state,
    /// re-provision the working tree for the new target.
    SetRemote(Option<String>),
    Shutdown,
}

/// User-facing outcomes emitted by the worker. The agent maps these onto
/// its notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    /// First successful push for the current batch.
    Synced,
    /// Retryable failure; another attempt follows on the retry cadence.
    Retrying(String),
    /// Terminal failure needing user attention.
    Failed(String),
}

/// Outcome of one attempt task.
#[derive(Debug)]
pub enum AttemptResult {
    /// Nothing to commit; no push was attempted.
    CleanTree,
    /// status/add/commit failed. Never retried.
    CommitFailed(GitError),
    /// Provisioning clone failed. Clones run outside the attempt slot, so
    /// this never touches `in_progress`.
    CloneFailed(GitError),
    /// A push ran. `committed` is true when this attempt created a commit
    /// (a new batch).
    Pushed {
        committed: bool,
        result: Result<(), GitError>,
    },
}

#[derive(Debug)]
struct Finished {
    generation: u64,
    result: AttemptResult,
}

#[derive(Debug, Clone, Copy)]
enum AttemptKind {
    CommitAndPush,
    PushOnly,
}

/// Cloneable command-channel handle to a spawned [`SyncEngine`] worker.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<SyncCommand>,
}

impl SyncHandle {
    pub async fn commit(&self) {
        let _ = self.tx.send(SyncCommand::Commit).await;
    }

    pub async fn set_remote(&self, remote: Option<String>) {
        let _ = self.tx.send(SyncCommand::SetRemote(remote)).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(SyncCommand::Shutdown).await;
    }

    /// Handle with no worker behind it; every send is dropped. Lets callers
    /// wire up an inert sync path (and tests skip the engine).
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }
}

pub struct SyncEngine {
    backend: Arc<dyn GitBackend>,
    tree: PathBuf,
    remote: Option<String>,
    notices: mpsc::Sender<SyncNotice>,
    done_tx: mpsc::Sender<Finished>,
    in_progress: bool,
    pending: bool,
    notified_success: bool,
    generation: u64,
    git_available: bool,
}

impl SyncEngine {
    /// Spawn the worker and return its handle. `retry_interval` is
    /// [`RETRY_INTERVAL`] in production; tests shorten it.
    pub fn spawn(
        backend: Arc<dyn GitBackend>,
        tree: PathBuf,
        remote: Option<String>,
        notices: mpsc::Sender<SyncNotice>,
        retry_interval: Duration,
    ) -> SyncHandle {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<SyncCommand>(64);
        let (mut engine, mut done_rx) = Self::new(backend, tree, remote, notices);

        tokio::spawn(async move {
            engine.start().await;

            let mut retry = tokio::time::interval(retry_interval);
            retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
            retry.tick().await; // interval fires immediately; swallow it

            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => match cmd {
                        Some(SyncCommand::Commit) => engine.on_commit(),
                        Some(SyncCommand::SetRemote(remote)) => engine.on_set_remote(remote),
                        Some(SyncCommand::Shutdown) | None => break,
                    },
                    Some(finished) = done_rx.recv() => engine.on_finished(finished).await,
                    _ = retry.tick() => engine.on_retry_tick(),
                }
            }
            tracing::debug!("sync worker stopped");
        });

        SyncHandle { tx: cmd_tx }
    }

    fn new(
        backend: Arc<dyn GitBackend>,
        tree: PathBuf,
        remote: Option<String>,
        notices: mpsc::Sender<SyncNotice>,
    ) -> (Self, mpsc::Receiver<Finished>) {
        let (done_tx, done_rx) = mpsc::channel(16);
        (
            Self {
                backend,
                tree,
                remote,
                notices,
                done_tx,
                in_progress: false,
                pending: false,
                notified_success: false,
                generation: 0,
                git_available: false,
            },
            done_rx,
        )
    }

    /// Probe the tool once; a missing binary leaves the engine inert while
    /// local flushing continues. Provisions the initial remote.
    async fn start(&mut self) {
        match self.backend.version().await {
            Ok(()) => {
                self.git_available = true;
                if let Some(remote) = self.remote.clone() {
                    self.provision(remote);
                }
            }
            Err(e) => {
                self.git_available = false;
                self.notify(SyncNotice::Failed(format!(
                    "sync disabled: {e}; snapshots are still recorded locally"
                )))
                .await;
            }
        }
    }

    fn on_commit(&mut self) {
        if self.in_progress || !self.git_available {
            return;
        }
        let Some(remote) = self.remote.clone() else {
            return;
        };
        self.in_progress = true;
        self.spawn_attempt(remote, AttemptKind::CommitAndPush);
    }

    fn on_retry_tick(&mut self) {
        if !self.pending || self.in_progress || !self.git_available {
            return;
        }
        let Some(remote) = self.remote.clone() else {
            return;
        };
        self.in_progress = true;
        self.spawn_attempt(remote, AttemptKind::PushOnly);
    }

    fn on_set_remote(&mut self, remote: Option<String>) {
        self.generation += 1;
        self.pending = false;
        self.notified_success = false;
        self.remote = remote;
        if self.git_available {
            if let Some(remote) = self.remote.clone() {
                self.provision(remote);
            }
        }
    }

    async fn on_finished(&mut self, finished: Finished) {
        // Attempt results free the slot regardless of staleness. Clone
        // results never held it: a provisioning clone can still be running
        // when a commit attempt starts, and letting its failure clear the
        // slot would permit a second concurrent sequence on the tree.
        if !matches!(finished.result, AttemptResult::CloneFailed(_)) {
            self.in_progress = false;
        }
        if finished.generation != self.generation {
            tracing::debug!(
                stale = finished.generation,
                current = self.generation,
                "discarding stale sync result"
            );
            return;
        }

        match finished.result {
            AttemptResult::CleanTree => {}
            AttemptResult::CommitFailed(e) => {
                self.pending = false;
                let diag = e.diagnostic();
                self.notify(SyncNotice::Failed(classify(&diag).describe(&diag)))
                    .await;
            }
            AttemptResult::CloneFailed(e) => {
                let diag = e.diagnostic();
                self.notify(SyncNotice::Failed(classify(&diag).describe(&diag)))
                    .await;
            }
            AttemptResult::Pushed { committed, result } => {
                if committed {
                    // New batch: the next success should be announced again.
                    self.notified_success = false;
                }
                match result {
                    Ok(()) => {
                        self.pending = false;
                        if !self.notified_success {
                            self.notified_success = true;
                            self.notify(SyncNotice::Synced).await;
                        }
                    }
                    Err(e) => {
                        let diag = e.diagnostic();
                        let failure = classify(&diag);
                        if failure.is_retryable() {
                            self.pending = true;
                            self.notify(SyncNotice::Retrying(failure.describe(&diag)))
                                .await;
                        } else {
                            self.pending = false;
                            self.notify(SyncNotice::Failed(failure.describe(&diag)))
                                .await;
                        }
                    }
                }
            }
        }
    }

    fn spawn_attempt(&self, remote: String, kind: AttemptKind) {
        let backend = Arc::clone(&self.backend);
        let tree = self.tree.clone();
        let generation = self.generation;
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let result = match kind {
                AttemptKind::CommitAndPush => {
                    run_attempt(backend.as_ref(), &tree, &remote).await
                }
                AttemptKind::PushOnly => AttemptResult::Pushed {
                    committed: false,
                    result: backend.push(&tree, &remote).await,
                },
            };
            let _ = done.send(Finished { generation, result }).await;
        });
    }

    /// Clone the remote into the tree if no working copy exists yet.
    fn provision(&self, remote: String) {
        if self.tree.join(".git").exists() {
            return;
        }
        let backend = Arc::clone(&self.backend);
        let tree = self.tree.clone();
        let generation = self.generation;
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = GitBackend::clone_into(backend.as_ref(), &remote, &tree).await {
                let _ = done
                    .send(Finished {
                        generation,
                        result: AttemptResult::CloneFailed(e),
                    })
                    .await;
            }
        });
    }

    async fn notify(&self, notice: SyncNotice) {
        let _ = self.notices.send(notice).await;
    }
}

/// The full commit-then-push sequence against a working tree. A clean tree
/// short-circuits to success without committing or pushing. Shared by the
/// worker's attempt tasks and the one-shot `pulse sync` path.
pub async fn run_attempt(backend: &dyn GitBackend, tree: &Path, remote: &str) -> AttemptResult {
    match backend.has_changes(tree).await {
        Ok(false) => return AttemptResult::CleanTree,
        Ok(true) => {}
        Err(e) => return AttemptResult::CommitFailed(e),
    }
    if let Err(e) = backend.add_all(tree).await {
        return AttemptResult::CommitFailed(e);
    }
    if let Err(e) = backend.commit(tree, COMMIT_MESSAGE).await {
        return AttemptResult::CommitFailed(e);
    }
    AttemptResult::Pushed {
        committed: true,
        result: backend.push(tree, remote).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockGit;
    use tokio::time::timeout;

    const TICK: Duration = Duration::from_millis(40);

    fn channels() -> (mpsc::Sender<SyncNotice>, mpsc::Receiver<SyncNotice>) {
        mpsc::channel(16)
    }

    async fn next_notice(rx: &mut mpsc::Receiver<SyncNotice>) -> SyncNotice {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for notice")
            .expect("notice channel closed")
    }

    fn ready_engine(
        git: Arc<MockGit>,
        remote: &str,
    ) -> (
        SyncEngine,
        mpsc::Receiver<Finished>,
        mpsc::Receiver<SyncNotice>,
    ) {
        let (tx, notices) = channels();
        let (mut engine, done_rx) =
            SyncEngine::new(git, PathBuf::from("/t"), Some(remote.into()), tx);
        engine.git_available = true;
        (engine, done_rx, notices)
    }

    // ── run_attempt ──

    #[tokio::test]
    async fn clean_tree_is_a_noop() {
        let git = MockGit::new();
        let result = run_attempt(&git, Path::new("/t"), "origin").await;
        assert!(matches!(result, AttemptResult::CleanTree));
        assert_eq!(git.calls(), vec!["status"]);
    }

    #[tokio::test]
    async fn dirty_tree_commits_then_pushes() {
        let git = MockGit::new();
        git.set_dirty(true);
        let result = run_attempt(&git, Path::new("/t"), "origin").await;
        assert!(matches!(
            result,
            AttemptResult::Pushed {
                committed: true,
                result: Ok(())
            }
        ));
        assert_eq!(git.calls(), vec!["status", "add", "commit", "push"]);
    }

    #[tokio::test]
    async fn commit_failure_stops_before_push() {
        let git = MockGit::new();
        git.set_dirty(true);
        git.fail_next_commit("fatal: unable to write commit");
        let result = run_attempt(&git, Path::new("/t"), "origin").await;
        assert!(matches!(result, AttemptResult::CommitFailed(_)));
        assert_eq!(git.push_count(), 0);
    }

    // ── state transitions ──

    #[tokio::test]
    async fn offline_push_sets_pending() {
        let git = Arc::new(MockGit::new());
        git.set_dirty(true);
        git.queue_push(Some("Could not resolve host: example.com"));
        let (mut engine, mut done_rx, _notices) = ready_engine(Arc::clone(&git), "origin");

        engine.on_commit();
        assert!(engine.in_progress);
        let finished = done_rx.recv().await.unwrap();
        engine.on_finished(finished).await;

        assert!(engine.pending);
        assert!(!engine.in_progress);
    }

    #[tokio::test]
    async fn not_found_push_clears_pending() {
        let git = Arc::new(MockGit::new());
        git.set_dirty(true);
        git.queue_push(Some("ERROR: Repository not found."));
        let (mut engine, mut done_rx, _notices) = ready_engine(Arc::clone(&git), "origin");

        engine.on_commit();
        let finished = done_rx.recv().await.unwrap();
        engine.on_finished(finished).await;

        assert!(!engine.pending);
        // Retry tick must not spawn another push for a terminal failure.
        engine.on_retry_tick();
        assert!(!engine.in_progress);
        assert_eq!(git.push_count(), 1);
    }

    #[tokio::test]
    async fn retry_tick_spawns_exactly_one_push() {
        let git = Arc::new(MockGit::new());
        let (mut engine, mut done_rx, _notices) = ready_engine(Arc::clone(&git), "origin");
        engine.pending = true;

        engine.on_retry_tick();
        assert!(engine.in_progress);
        // A second tick while in flight is ignored.
        engine.on_retry_tick();

        let finished = done_rx.recv().await.unwrap();
        assert!(matches!(
            finished.result,
            AttemptResult::Pushed {
                committed: false,
                ..
            }
        ));
        engine.on_finished(finished).await;
        assert_eq!(git.push_count(), 1);
        assert!(!engine.pending);
    }

    #[tokio::test]
    async fn commit_while_in_progress_is_ignored() {
        let git = Arc::new(MockGit::new());
        git.set_dirty(true);
        let (mut engine, mut done_rx, _notices) = ready_engine(Arc::clone(&git), "origin");

        engine.on_commit();
        engine.on_commit(); // second entry bounces off in_progress

        let finished = done_rx.recv().await.unwrap();
        engine.on_finished(finished).await;
        assert_eq!(git.calls().iter().filter(|c| *c == "status").count(), 1);
    }

    #[tokio::test]
    async fn clone_failure_does_not_free_the_attempt_slot() {
        let git = Arc::new(MockGit::new());
        git.set_dirty(true);
        let (mut engine, mut done_rx, _notices) = ready_engine(Arc::clone(&git), "origin");

        engine.on_commit();
        assert!(engine.in_progress);

        // A slow provisioning clone fails while the attempt is in flight.
        engine
            .on_finished(Finished {
                generation: engine.generation,
                result: AttemptResult::CloneFailed(GitError::Command {
                    command: "clone".to_string(),
                    stderr: "fatal: unable to access 'x': Could not resolve host".to_string(),
                }),
            })
            .await;
        assert!(engine.in_progress, "clone results must not touch the slot");

        // The real attempt still completes and frees it.
        let finished = done_rx.recv().await.unwrap();
        engine.on_finished(finished).await;
        assert!(!engine.in_progress);
    }

    #[tokio::test]
    async fn stale_generation_result_is_discarded() {
        let git = Arc::new(MockGit::new());
        git.set_dirty(true);
        let (mut engine, mut done_rx, _notices) = ready_engine(Arc::clone(&git), "origin");

        // Push in flight under generation 0...
        engine.on_commit();
        let finished = done_rx.recv().await.unwrap();

        // ...remote reconfigured before the result lands.
        engine.on_set_remote(Some("git@other:r.git".into()));
        let pending_before = engine.pending;
        let notified_before = engine.notified_success;

        engine.on_finished(finished).await;

        assert_eq!(engine.pending, pending_before);
        assert_eq!(engine.notified_success, notified_before);
        assert!(!engine.notified_success, "stale success must not notify");
        assert!(!engine.in_progress, "slot frees even for stale results");
    }

    #[tokio::test]
    async fn set_remote_clears_retry_state() {
        let git = Arc::new(MockGit::new());
        let (mut engine, _done_rx, _notices) = ready_engine(git, "origin");
        engine.pending = true;
        engine.notified_success = true;

        engine.on_set_remote(None);

        assert_eq!(engine.generation, 1);
        assert!(!engine.pending);
        assert!(!engine.notified_success);
        // No remote: neither commit nor retry may start an attempt.
        engine.on_commit();
        engine.pending = true;
        engine.on_retry_tick();
        assert!(!engine.in_progress);
    }

    // ── worker end to end ──

    #[tokio::test]
    async fn worker_syncs_and_notifies_once_per_batch() {
        let git = Arc::new(MockGit::new());
        git.set_dirty(true);
        let (tx, mut notices) = channels();
        let handle = SyncEngine::spawn(
            Arc::clone(&git) as Arc<dyn GitBackend>,
            PathBuf::from("/t"),
            Some("origin".into()),
            tx,
            TICK,
        );

        handle.commit().await;
        assert_eq!(next_notice(&mut notices).await, SyncNotice::Synced);

        // Second batch announces again.
        git.set_dirty(true);
        handle.commit().await;
        assert_eq!(next_notice(&mut notices).await, SyncNotice::Synced);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn worker_retries_offline_then_succeeds() {
        let git = Arc::new(MockGit::new());
        git.set_dirty(true);
        git.queue_push(Some("fatal: Could not resolve host: example.com"));
        git.queue_push(None);
        let (tx, mut notices) = channels();
        let handle = SyncEngine::spawn(
            Arc::clone(&git) as Arc<dyn GitBackend>,
            PathBuf::from("/t"),
            Some("origin".into()),
            tx,
            TICK,
        );

        handle.commit().await;
        assert!(matches!(
            next_notice(&mut notices).await,
            SyncNotice::Retrying(_)
        ));
        // The retry driver picks it up on its own cadence.
        assert_eq!(next_notice(&mut notices).await, SyncNotice::Synced);
        assert_eq!(git.push_count(), 2);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn worker_does_not_retry_terminal_failures() {
        let git = Arc::new(MockGit::new());
        git.set_dirty(true);
        git.queue_push(Some("ERROR: Repository not found."));
        let (tx, mut notices) = channels();
        let handle = SyncEngine::spawn(
            Arc::clone(&git) as Arc<dyn GitBackend>,
            PathBuf::from("/t"),
            Some("origin".into()),
            tx,
            TICK,
        );

        handle.commit().await;
        let notice = next_notice(&mut notices).await;
        assert!(matches!(notice, SyncNotice::Failed(msg) if msg.contains("does not exist")));

        // Give the retry interval several cycles; no second push.
        tokio::time::sleep(TICK * 4).await;
        assert_eq!(git.push_count(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn worker_reports_missing_tool_once_and_goes_inert() {
        let git = Arc::new(MockGit::unavailable());
        let (tx, mut notices) = channels();
        let handle = SyncEngine::spawn(
            Arc::clone(&git) as Arc<dyn GitBackend>,
            PathBuf::from("/t"),
            Some("origin".into()),
            tx,
            TICK,
        );

        let notice = next_notice(&mut notices).await;
        assert!(matches!(notice, SyncNotice::Failed(msg) if msg.contains("sync disabled")));

        handle.commit().await;
        tokio::time::sleep(TICK * 2).await;
        assert_eq!(git.push_count(), 0);

        handle.shutdown().await;
    }
}
