use std::path::Path;

use pulse_core::Snapshot;
use pulse_store::{PulseConfig, StorePaths};

pub fn execute(root: &Path) -> anyhow::Result<()> {
    let paths = StorePaths::discover(root);
    if !paths.is_initialized() {
        println!(
            "No pulse store at {}. Run `pulse init` first.",
            paths.root.display()
        );
        return Ok(());
    }
    let config = PulseConfig::load(&paths.config_json);

    println!("Store: {}", paths.root.display());
    println!("Aggregation: {}", on_off(config.enabled));
    println!(
        "Flush interval: {} min",
        config.flush_interval().as_secs() / 60
    );
    match config.remote() {
        Some(remote) => println!("Remote: {remote} (sync {})", on_off(config.sync_enabled)),
        None => println!("Remote: (not configured)"),
    }
    println!(
        "Working tree: {}",
        if paths.tree_dir.join(".git").exists() {
            "provisioned"
        } else {
            "not provisioned"
        }
    );

    match paths.latest_snapshot() {
        Some(path) => match read_snapshot(&path) {
            Some(snap) => println!(
                "Last snapshot: {} ({} files, {} lines changed)",
                snap.timestamp, snap.files_touched, snap.lines_changed
            ),
            None => println!("Last snapshot: {}", path.display()),
        },
        None => println!("Last snapshot: (none)"),
    }
    Ok(())
}

fn read_snapshot(path: &Path) -> Option<Snapshot> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

fn on_off(v: bool) -> &'static str {
    if v {
        "on"
    } else {
        "off"
    }
}
