use clap::Subcommand;
use std::path::Path;

use pulse_store::{PulseConfig, StorePaths};

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. remote_url)
        key: String,
        /// Config value (true/false/number/string)
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, root: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCmd::Set { key, value } => set(root, &key, &value),
        ConfigCmd::Get { key } => get(root, &key),
        ConfigCmd::List => list(root),
    }
}

// ── Command Implementations ──

const KEYS: &[&str] = &[
    "enabled",
    "notifications",
    "remote_url",
    "sync_enabled",
    "flush_interval_minutes",
];

fn open(root: &Path) -> anyhow::Result<(StorePaths, PulseConfig)> {
    let paths = StorePaths::discover(root);
    if !paths.is_initialized() {
        anyhow::bail!("No pulse store found. Run `pulse init` first.");
    }
    let config = PulseConfig::load(&paths.config_json);
    Ok((paths, config))
}

fn parse_bool(key: &str, value: &str) -> anyhow::Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => anyhow::bail!("{key} takes true or false, got \"{value}\""),
    }
}

/// `pulse config set <key> <value>`
pub fn set(root: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let (paths, mut config) = open(root)?;
    match key {
        "enabled" => config.enabled = parse_bool(key, value)?,
        "notifications" => config.notifications = parse_bool(key, value)?,
        "sync_enabled" => config.sync_enabled = parse_bool(key, value)?,
        "flush_interval_minutes" => {
            config.flush_interval_minutes = value
                .parse()
                .map_err(|_| anyhow::anyhow!("{key} takes a number of minutes, got \"{value}\""))?;
        }
        // An empty value clears the remote.
        "remote_url" => {
            config.remote_url = if value.trim().is_empty() {
                None
            } else {
                Some(value.to_string())
            };
        }
        _ => anyhow::bail!("unknown config key \"{key}\" (known: {})", KEYS.join(", ")),
    }
    config.save(&paths.config_json)?;
    println!("{key} = {value}");
    Ok(())
}

/// `pulse config get <key>`
pub fn get(root: &Path, key: &str) -> anyhow::Result<()> {
    let (_paths, config) = open(root)?;
    match value_of(&config, key) {
        Some(val) => println!("{val}"),
        None => anyhow::bail!("unknown config key \"{key}\" (known: {})", KEYS.join(", ")),
    }
    Ok(())
}

/// `pulse config list`
pub fn list(root: &Path) -> anyhow::Result<()> {
    let (_paths, config) = open(root)?;
    for key in KEYS {
        if let Some(val) = value_of(&config, key) {
            println!("{key} = {val}");
        }
    }
    Ok(())
}

fn value_of(config: &PulseConfig, key: &str) -> Option<String> {
    match key {
        "enabled" => Some(config.enabled.to_string()),
        "notifications" => Some(config.notifications.to_string()),
        "sync_enabled" => Some(config.sync_enabled.to_string()),
        "flush_interval_minutes" => Some(config.flush_interval_minutes.to_string()),
        "remote_url" => Some(
            config
                .remote_url
                .clone()
                .unwrap_or_else(|| "(not set)".to_string()),
        ),
        _ => None,
    }
}
