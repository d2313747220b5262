mod cache;
mod commands;
mod config;
mod db;
mod error;
mod jobs;
mod remote;
mod service;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LogConfig};
use crate::remote::http::HttpRemote;
use crate::service::SyncService;

#[derive(Parser, Debug)]
#[command(name = "collsync")]
#[command(about = "Queue mutations for a remote collection service and keep a local cache in sync")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/collsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Directory for the job and cache stores
  #[arg(long)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  // Held until exit so buffered log lines are flushed
  let _log_guard = setup_logging(&config.log)?;

  let data_dir = config.data_dir(args.data_dir.as_deref())?;
  let remote = Arc::new(HttpRemote::new(&config.remote, Config::get_api_token()?)?);

  let service = SyncService::start(&data_dir, remote.clone(), remote)?;
  commands::run(&service, args.command).await
}

/// Send logs to the configured file, or stderr so stdout stays clean for
/// command output.
fn setup_logging(log: &LogConfig) -> Result<Option<WorkerGuard>> {
  let default_directive = log.level.as_deref().unwrap_or("collsync=info");
  let filter =
    EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_directive))?;

  match &log.file {
    Some(path) => {
      let file = open_log_file(path)?;
      let (writer, guard) = tracing_appender::non_blocking(file);
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

fn open_log_file(path: &Path) -> Result<std::fs::File> {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .map_err(|e| eyre!("Failed to open log file {}: {}", path.display(), e))
}
