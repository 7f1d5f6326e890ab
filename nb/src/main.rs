//! nudgebot - task accountability chat bot
//!
//! CLI entry point: serve the webhook or inspect configuration.

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use nudgebot::cli::{Cli, Command, get_log_path, open_log_file};
use nudgebot::config::Config;
use nudgebot::server;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    // Read-only data dirs (e.g. in containers) log to stderr instead
    let log_path = get_log_path();
    let (writer, target) = match open_log_file(&log_path) {
        Ok(file) => (BoxMakeWriter::new(file), log_path.display().to_string()),
        Err(e) => {
            eprintln!("Warning: {:#}; logging to stderr", e);
            (BoxMakeWriter::new(std::io::stderr), "stderr".to_string())
        }
    };

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install log subscriber: {}", e))?;

    info!("Logging initialized (level: {:?}, target: {})", level, target);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            debug!("main: matched Serve command");
            cmd_serve(&config).await
        }
        Command::Config => {
            debug!("main: matched Config command");
            cmd_config(&config)
        }
    }
}

/// Run the bot in the foreground
async fn cmd_serve(config: &Config) -> Result<()> {
    debug!("cmd_serve: called");
    println!("Starting nudgebot on {} (logs: {})", config.server.bind, get_log_path().display());
    server::serve(config).await
}

/// Print the resolved configuration
fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(&config.redacted()).context("Failed to render configuration")?;
    print!("{}", yaml);
    if let Err(e) = config.validate() {
        eprintln!("Warning: {}", e);
    }
    Ok(())
}
