use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use pulse_agent::{Agent, StdoutNotifier};
use pulse_store::{PulseConfig, StorePaths};
use pulse_sync::engine::RETRY_INTERVAL;
use pulse_sync::{GitBackend, GitCli, SyncEngine};

pub fn execute(root: &Path) -> anyhow::Result<()> {
    init_logging();

    let paths = StorePaths::discover(root);
    anyhow::ensure!(
        paths.is_initialized(),
        "no pulse store at {}; run `pulse init` first",
        paths.root.display()
    );
    paths.ensure_layout()?;
    let _lock = pulse_store::lock_file(&paths.lock_file)
        .context("is another `pulse run` already using this store?")?;
    let config = PulseConfig::load(&paths.config_json);

    let cancel = CancellationToken::new();
    ctrlc_cancel(cancel.clone());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let (notice_tx, notice_rx) = mpsc::channel(16);
        let sync = SyncEngine::spawn(
            Arc::new(GitCli::new()) as Arc<dyn GitBackend>,
            paths.tree_dir.clone(),
            config.remote().map(str::to_string),
            notice_tx,
            RETRY_INTERVAL,
        );
        let agent = Agent::new(paths, config, sync, Arc::new(StdoutNotifier));
        pulse_agent::run(agent, notice_rx, cancel).await
    })
}

fn ctrlc_cancel(cancel: CancellationToken) {
    let _ = ctrlc::set_handler(move || {
        cancel.cancel();
    });
}

/// Diagnostics go to stderr; stdout carries the notifier lines the host
/// editor reads.
fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
