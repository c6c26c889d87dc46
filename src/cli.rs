//! Command-line interface definitions.
//!
//! # Example
//!
//! ```bash
//! # Protect a file: move it into /secure and remove copies under $HOME
//! dlpwatch register ~/Downloads/report.pdf --dir /secure
//!
//! # Enforce until Ctrl+C, printing alerts as they happen
//! dlpwatch watch --follow
//!
//! # Review and clear alert history
//! dlpwatch alerts list
//! dlpwatch alerts clear
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Data-leak-prevention watcher.
///
/// Registers sensitive files by content hash and an allowed directory, then
/// watches a tree and deletes stray copies or restores moved originals.
#[derive(Debug, Parser)]
#[command(name = "dlpwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (default: platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Watch a tree and enforce policy until interrupted
    Watch(WatchArgs),
    /// Register a file as sensitive content
    Register(RegisterArgs),
    /// List registered files, most recent first
    List(ListArgs),
    /// Remove a registration by id
    Unregister(UnregisterArgs),
    /// Inspect or clear the alert history
    #[command(subcommand)]
    Alerts(AlertsCommand),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Root of the watched tree (default: from config, usually $HOME)
    #[arg(long, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Number of event worker threads
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub workers: Option<u64>,

    /// Seconds between registry cache refreshes
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_interval: Option<u64>,

    /// Gitignore-style pattern to ignore (repeatable)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Move stray copies to the system trash instead of deleting them
    #[arg(long)]
    pub trash: bool,

    /// Print each alert to stdout as it is raised
    #[arg(short, long)]
    pub follow: bool,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// File to protect
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// The only directory the content may live in
    #[arg(short, long, value_name = "ALLOWED_DIR")]
    pub dir: PathBuf,

    /// Do not search for and delete existing copies
    #[arg(long)]
    pub no_sweep: bool,

    /// Tree to sweep for existing copies (default: watch root)
    #[arg(long, value_name = "PATH", conflicts_with = "no_sweep")]
    pub sweep_root: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Output JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct UnregisterArgs {
    /// Record id, as shown by `list`
    #[arg(value_name = "ID")]
    pub id: i64,
}

#[derive(Debug, Subcommand)]
pub enum AlertsCommand {
    /// Show alert history, most recent first
    List(ListArgs),
    /// Truncate the alert log
    Clear,
}
