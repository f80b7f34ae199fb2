pub mod config_cmd;
pub mod import;
pub mod scan;
pub mod status;
pub mod suggest;
pub mod worker;

use crate::config::BacklinksConfig;
use anyhow::{Context, Result};
use backlinks_core::{Backlinks, Item};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "backlinks")]
#[command(version, about = "Backlink index and link suggestions for content items")]
pub struct Cli {
    /// Path to backlinks.toml
    #[arg(
        long,
        global = true,
        env = "BACKLINKS_CONFIG",
        default_value = "backlinks.toml"
    )]
    pub config: PathBuf,

    /// Path to data directory (overrides config file)
    #[arg(long, global = true, env = "BACKLINKS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Load items and taxonomy terms from a JSON file
    Import(ImportArgs),
    /// Rescan items for outgoing links
    Rescan(RescanArgs),
    /// Backlink counts for every tracked item, grouped by count
    Status(StatusArgs),
    /// Incoming and outgoing links of one item
    Show(ShowArgs),
    /// Suggest links for an item
    Suggest(SuggestArgs),
    /// Items that have never been scanned
    Unscanned(FormatArgs),
    /// Forget the outgoing links of items, returning them to the backlog
    Deregister(DeregisterArgs),
    /// Arm a backlog drain if there is work
    Tick,
    /// Drain one backlog batch right now
    Drain(FormatArgs),
    /// Run the backlog worker until interrupted
    Worker(WorkerArgs),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    Validate,
    Show,
}

#[derive(Args, Debug)]
pub struct FormatArgs {
    /// "table" or "json"
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    pub file: PathBuf,
    /// Scan imported items whose content changed
    #[arg(long)]
    pub scan: bool,
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct RescanArgs {
    /// Only these items. Default: every tracked item.
    pub ids: Vec<u64>,
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show items with at most this many backlinks
    #[arg(long)]
    pub max: Option<u64>,
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: u64,
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    pub id: u64,
    /// Show candidates per taxonomy, for both directions
    #[arg(long)]
    pub verbose: bool,
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct DeregisterArgs {
    pub ids: Vec<u64>,
    /// Deregister every tracked item
    #[arg(long, conflicts_with = "ids")]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Seconds between backlog checks (overrides config file)
    #[arg(long)]
    pub interval: Option<u64>,
}

pub fn open_index(config: &BacklinksConfig) -> Result<Backlinks> {
    let dir = &config.storage.data_dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
    Backlinks::open(config.db_path(), config.library_config())
        .with_context(|| format!("Failed to open {}", config.db_path().display()))
}

pub fn is_json(format: &str) -> Result<bool> {
    match format {
        "json" => Ok(true),
        "table" => Ok(false),
        other => anyhow::bail!("Unknown format: {} (expected table or json)", other),
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// --- Table printing helpers ---

pub fn print_item_table(header: &str, items: &[Item]) {
    if items.is_empty() {
        println!("{} - none", header);
        return;
    }
    println!("{}", header);
    println!(
        "{:<8}  {:<8}  {:<8}  {:<40}  {}",
        "ID", "TYPE", "STATUS", "TITLE", "MODIFIED"
    );
    println!("{}", "─".repeat(90));
    for item in items {
        println!(
            "{:<8}  {:<8}  {:<8}  {:<40}  {}",
            item.id,
            item.kind,
            item.status,
            truncate(&item.title, 40),
            item.modified_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}…", s.chars().take(max - 1).collect::<String>())
    }
}
