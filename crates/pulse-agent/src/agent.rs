//! The daemon: owns the activity buffer and serializes every entry point
//! (bridge lines, flush ticks, config reloads, sync notices) through one
//! select loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use pulse_core::{ActivityBuffer, EditEvent};
use pulse_store::{PulseConfig, StorePaths};
use pulse_sync::{SyncHandle, SyncNotice};

use crate::intake::{self, BridgeLine};
use crate::notify::Notifier;
use crate::scheduler::{self, FlushOutcome};

/// Cadence of the config-reload poll.
pub const RELOAD_INTERVAL: Duration = Duration::from_secs(2);

pub struct Agent {
    paths: StorePaths,
    config: PulseConfig,
    buffer: ActivityBuffer,
    sync: SyncHandle,
    notifier: Arc<dyn Notifier>,
    warned_missing_remote: bool,
    skipped_lines: u64,
}

impl Agent {
    pub fn new(
        paths: StorePaths,
        config: PulseConfig,
        sync: SyncHandle,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            paths,
            config,
            buffer: ActivityBuffer::new(),
            sync,
            notifier,
            warned_missing_remote: false,
            skipped_lines: 0,
        }
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    /// Dispatch one bridge line.
    pub async fn handle_line(&mut self, line: &str) {
        match intake::parse_line(line) {
            Some(BridgeLine::Edit(event)) => self.handle_edit(event).await,
            Some(BridgeLine::Flush) => self.flush(true).await,
            Some(BridgeLine::Sync) => self.request_sync().await,
            None => {
                if !line.trim().is_empty() {
                    self.skipped_lines += 1;
                }
            }
        }
    }

    pub async fn handle_edit(&mut self, event: EditEvent) {
        if !self.config.enabled || !event.is_local_file() {
            return;
        }
        self.buffer.record_event(&event);
        self.notifier
            .status(&intake::status_line(
                self.buffer.files_touched(),
                self.buffer.lines_changed(),
            ))
            .await;
    }

    /// Drain-and-write, then hand off to the sync engine. `manual` is the
    /// forced trigger; only it reports an empty buffer.
    pub async fn flush(&mut self, manual: bool) {
        match scheduler::flush_now(&mut self.buffer, &self.paths, self.config.enabled) {
            Ok(FlushOutcome::Skipped) => {}
            Ok(FlushOutcome::NoActivity) => {
                if manual {
                    self.notify_info("no activity to snapshot").await;
                }
            }
            Ok(FlushOutcome::Written(path)) => {
                tracing::debug!(path = %path.display(), "snapshot written");
                self.notifier.status("snapshot saved").await;
                if self.config.sync_target().is_some() {
                    self.sync.commit().await;
                } else {
                    self.maybe_warn_unconfigured().await;
                }
            }
            Err(e) => {
                // The buffer was already reset; that activity is gone.
                self.notify_warn(&format!("failed to write snapshot: {e}"))
                    .await;
            }
        }
    }

    async fn request_sync(&mut self) {
        if self.config.sync_target().is_some() {
            self.sync.commit().await;
        } else {
            self.maybe_warn_unconfigured().await;
        }
    }

    /// Re-read `config.json` and apply changes. Returns the new flush
    /// period when the timer must be re-armed.
    pub async fn reload_config(&mut self) -> Option<Duration> {
        let fresh = PulseConfig::load(&self.paths.config_json);
        if fresh == self.config {
            return None;
        }

        let rearm =
            (fresh.flush_interval() != self.config.flush_interval()).then(|| fresh.flush_interval());
        let remote_changed = fresh.remote() != self.config.remote();

        self.config = fresh;
        if remote_changed {
            self.warned_missing_remote = false;
            self.sync
                .set_remote(self.config.remote().map(str::to_string))
                .await;
        }
        rearm
    }

    pub async fn on_notice(&self, notice: SyncNotice) {
        match notice {
            SyncNotice::Synced => self.notify_info("activity synced").await,
            SyncNotice::Retrying(message) | SyncNotice::Failed(message) => {
                self.notify_warn(&message).await
            }
        }
    }

    async fn maybe_warn_unconfigured(&mut self) {
        if self.config.sync_enabled && self.config.remote().is_none() && !self.warned_missing_remote
        {
            self.warned_missing_remote = true;
            self.notify_warn(
                "sync is enabled but no remote is configured; set one with `pulse config set remote_url <url>`",
            )
            .await;
        }
    }

    async fn notify_info(&self, message: &str) {
        if self.config.notifications {
            self.notifier.info(message).await;
        }
    }

    async fn notify_warn(&self, message: &str) {
        if self.config.notifications {
            self.notifier.warn(message).await;
        }
    }
}

/// Run the daemon until the bridge closes or `cancel` fires.
pub async fn run(
    mut agent: Agent,
    mut notices: mpsc::Receiver<SyncNotice>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    agent.maybe_warn_unconfigured().await;

    let mut flush_timer = scheduler::flush_timer(agent.config.flush_interval());
    let mut reload = tokio::time::interval(RELOAD_INTERVAL);
    reload.set_missed_tick_behavior(MissedTickBehavior::Delay);
    reload.tick().await; // interval fires immediately; swallow it

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => agent.handle_line(&line).await,
                Ok(None) => break, // host closed the bridge
                Err(e) => {
                    tracing::warn!(error = %e, "bridge stdin failed");
                    break;
                }
            },
            _ = flush_timer.tick() => agent.flush(false).await,
            _ = reload.tick() => {
                if let Some(period) = agent.reload_config().await {
                    // Drop-and-replace: exactly one timer, new cadence.
                    flush_timer = scheduler::flush_timer(period);
                }
            }
            Some(notice) = notices.recv() => agent.on_notice(notice).await,
        }
    }

    // Flush what is buffered so a clean shutdown does not drop it.
    agent.flush(false).await;
    agent.sync.shutdown().await;
    if agent.skipped_lines > 0 {
        tracing::info!(count = agent.skipped_lines, "malformed bridge lines skipped");
    }
    Ok(())
}
