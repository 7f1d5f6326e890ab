//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// nudgebot - task accountability chat bot
#[derive(Parser)]
#[command(
    name = "nb",
    about = "Chat bot that queues your daily goals and nudges you until they are done",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the webhook server, reminders and morning trigger (default)
    Serve,

    /// Print the resolved configuration with secrets redacted
    Config,
}

/// Path of the log file written by `nb`
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nudgebot")
        .join("logs")
        .join("nudgebot.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Open the log file for appending, creating its directory first
pub fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(log_dir) = path.parent() {
        fs::create_dir_all(log_dir).context(format!("Failed to create log directory {}", log_dir.display()))?;
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context(format!("Failed to open log file {}", path.display()))
}
