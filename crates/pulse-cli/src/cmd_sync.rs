use std::path::Path;

use anyhow::Context;

use pulse_store::{PulseConfig, StorePaths};
use pulse_sync::engine::run_attempt;
use pulse_sync::{classify, AttemptResult, GitBackend, GitCli};

/// One-shot commit+push of whatever is sitting in the working tree. Shares
/// the attempt sequence with the daemon's sync engine.
pub fn execute(root: &Path) -> anyhow::Result<()> {
    let paths = StorePaths::discover(root);
    anyhow::ensure!(
        paths.is_initialized(),
        "no pulse store at {}; run `pulse init` first",
        paths.root.display()
    );
    let config = PulseConfig::load(&paths.config_json);
    let Some(remote) = config.remote() else {
        anyhow::bail!("no remote configured; set one with `pulse config set remote_url <url>`");
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let git = GitCli::new();
        git.version()
            .await
            .context("sync needs the git binary on PATH")?;

        if !paths.tree_dir.join(".git").exists() {
            println!("Cloning {remote}...");
            if let Err(e) = git.clone_into(remote, &paths.tree_dir).await {
                let diag = e.diagnostic();
                anyhow::bail!("clone failed: {}", classify(&diag).describe(&diag));
            }
        }

        match run_attempt(&git, &paths.tree_dir, remote).await {
            AttemptResult::CleanTree => println!("Nothing to sync."),
            AttemptResult::Pushed { result: Ok(()), .. } => println!("Synced to {remote}."),
            AttemptResult::Pushed {
                result: Err(e), ..
            } => {
                let diag = e.diagnostic();
                anyhow::bail!("push failed: {}", classify(&diag).describe(&diag));
            }
            AttemptResult::CommitFailed(e) | AttemptResult::CloneFailed(e) => {
                let diag = e.diagnostic();
                anyhow::bail!("commit failed: {}", classify(&diag).describe(&diag));
            }
        }
        Ok(())
    })
}
