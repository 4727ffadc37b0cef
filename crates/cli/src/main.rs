//! Scan processor CLI - scanproc command

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod cmd;

/// Scan processor - merges scanner sessions into single PDFs
#[derive(Parser)]
#[command(name = "scanproc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/scan-processor/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon
    Start {
        /// Run in foreground (for debugging)
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the daemon
    Stop,
    /// Show daemon status and pending files
    Status,
    /// Merge pending files now
    Flush,
    /// View and edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all configuration values
    List,
    /// Get a configuration value
    Get {
        /// Config key (e.g. timeout_secs)
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Config key (e.g. timeout_secs)
        key: String,
        /// New value
        value: String,
    },
    /// Show the config file path
    Path {
        /// Create the file from the example if missing
        #[arg(long)]
        create: bool,
    },
    /// Print an example configuration
    Example,
}

/// Install the tracing subscriber
///
/// The returned guard flushes the non-blocking file writer on drop.
fn init_logging(
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;

            std::fs::create_dir_all(dir).context("Failed to create log directory")?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();

            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();

            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(cli.log_file.as_deref())?;
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Start { foreground } => cmd::start::run(config, foreground).await,
        Commands::Stop => cmd::stop::run().await,
        Commands::Status => cmd::status::run(config).await,
        Commands::Flush => cmd::flush::run(config).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list(config).await,
            ConfigCommands::Get { key } => cmd::config::run_get(config, &key).await,
            ConfigCommands::Set { key, value } => {
                cmd::config::run_set(config, &key, &value).await
            }
            ConfigCommands::Path { create } => cmd::config::run_path(config, create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
        },
    }
}
