use std::path::Path;

use pulse_store::{PulseConfig, StorePaths};
use pulse_sync::{classify, GitBackend, GitCli};

pub fn execute(root: &Path, remote: Option<&str>) -> anyhow::Result<()> {
    let paths = StorePaths::discover(root);
    let already = paths.config_json.exists();

    let mut config = PulseConfig::load(&paths.config_json);
    if let Some(remote) = remote {
        config.remote_url = Some(remote.to_string());
    }
    config.save(&paths.config_json)?;

    // Clone before the activity/ subtree exists so the destination is
    // still an empty (or absent) directory.
    if let Some(remote) = config.remote() {
        provision(&paths, remote)?;
    } else {
        println!("No remote configured; set one with `pulse config set remote_url <url>`.");
    }
    paths.ensure_layout()?;

    if already {
        println!("Already initialized at {}", paths.root.display());
    } else {
        println!("Initialized pulse store at {}", paths.root.display());
    }
    Ok(())
}

fn provision(paths: &StorePaths, remote: &str) -> anyhow::Result<()> {
    if paths.tree_dir.join(".git").exists() {
        return Ok(());
    }
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let git = GitCli::new();
        if git.version().await.is_err() {
            eprintln!("warning: git not available; snapshots stay local until it is installed");
            return Ok(());
        }
        match git.clone_into(remote, &paths.tree_dir).await {
            Ok(()) => println!("Cloned {remote}"),
            Err(e) => {
                let diag = e.diagnostic();
                eprintln!("warning: clone failed: {}", classify(&diag).describe(&diag));
            }
        }
        Ok(())
    })
}
