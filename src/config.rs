use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub remote: RemoteConfig,
  /// Directory holding jobs.db and cache.db (defaults to the platform data dir)
  pub data_dir: Option<PathBuf>,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  /// Base URL of the collection service API
  pub url: String,
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
  30
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
  /// Filter directive, e.g. "collsync=debug". `RUST_LOG` takes precedence.
  pub level: Option<String>,
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Config {
  /// Load configuration from `explicit_path`, or the first file found in
  /// [`Config::search_paths`].
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    if let Some(path) = explicit_path {
      if !path.is_file() {
        return Err(eyre!("Config file not found: {}", path.display()));
      }
      return Self::load_from_path(path);
    }

    let candidates = Self::search_paths();
    match candidates.iter().find(|p| p.is_file()) {
      Some(path) => Self::load_from_path(path),
      None => Err(eyre!(
        "No configuration file found (searched {}).\nSee config.example.yaml for the format.",
        candidates
          .iter()
          .map(|p| p.display().to_string())
          .collect::<Vec<_>>()
          .join(", ")
      )),
    }
  }

  /// Candidate config files, most specific first: ./collsync.yaml, then
  /// $XDG_CONFIG_HOME/collsync/config.yaml.
  fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("collsync.yaml")];
    if let Some(config_dir) = dirs::config_dir() {
      paths.push(config_dir.join("collsync").join("config.yaml"));
    }
    paths
  }

  /// Read and parse `path`. Relative `data_dir` and `log.file` entries are
  /// taken relative to the directory holding the file, not the working
  /// directory of whoever runs the command.
  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
    let mut config = Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    if let Some(base) = path.parent() {
      config.anchor_paths(base);
    }
    Ok(config)
  }

  fn anchor_paths(&mut self, base: &Path) {
    for path in [self.data_dir.as_mut(), self.log.file.as_mut()].into_iter().flatten() {
      if path.is_relative() {
        *path = base.join(&*path);
      }
    }
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Directory for the job and cache stores.
  ///
  /// `override_dir` (from the command line) wins over the config file.
  pub fn data_dir(&self, override_dir: Option<&Path>) -> Result<PathBuf> {
    override_dir
      .map(Path::to_path_buf)
      .or_else(|| self.data_dir.clone())
      .or_else(crate::db::default_data_dir)
      .ok_or_else(|| eyre!("Could not determine a data directory. Set data_dir in the config file."))
  }

  /// Get the remote API token from environment variables.
  ///
  /// Checks COLLSYNC_TOKEN first, then COLLSYNC_REMOTE_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("COLLSYNC_TOKEN")
      .or_else(|_| std::env::var("COLLSYNC_REMOTE_TOKEN"))
      .map_err(|_| {
        eyre!("Remote API token not found. Set COLLSYNC_TOKEN or COLLSYNC_REMOTE_TOKEN environment variable.")
      })
  }
}
