mod cmd_config;
mod cmd_init;
mod cmd_run;
mod cmd_status;
mod cmd_sync;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pulse", version, about = "Local-first activity snapshots with git sync")]
struct Cli {
    /// Store root (defaults to the per-user data directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the snapshot store
    Init {
        /// Git remote to sync snapshots to
        #[arg(long)]
        remote: Option<String>,
    },
    /// Run the agent: read editor events from stdin, flush on a timer
    Run,
    /// Read or change configuration
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
    /// Show store and sync status
    Status,
    /// Commit and push pending snapshots once
    Sync,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let root = cli.root.unwrap_or_else(pulse_store::store_root);

    match cli.cmd {
        Command::Init { remote } => cmd_init::execute(&root, remote.as_deref()),
        Command::Run => cmd_run::execute(&root),
        Command::Config { cmd } => cmd_config::run(cmd, &root),
        Command::Status => cmd_status::execute(&root),
        Command::Sync => cmd_sync::execute(&root),
    }
}
