use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub features: FeaturesConfig,
  /// Where local state and logs live (defaults to the platform data dir)
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Global request timeout in milliseconds
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_ms: default_timeout_ms(),
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
  DEFAULT_TIMEOUT_MS
}

/// Optional product areas that can be switched off per deployment
#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
  #[serde(default = "enabled")]
  pub chatbot: bool,
  #[serde(default = "enabled")]
  pub nutrition_tracker: bool,
}

impl Default for FeaturesConfig {
  fn default() -> Self {
    Self {
      chatbot: true,
      nutrition_tracker: true,
    }
  }
}

fn enabled() -> bool {
  true
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./fitflix.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/fitflix/config.yaml
  ///
  /// Without any file the defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("fitflix.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("fitflix").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is a valid, all-defaults config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Apply FITFLIX_API_BASE_URL and FITFLIX_API_TIMEOUT from the environment.
  pub fn with_env_overrides(self) -> Result<Self> {
    self.with_overrides(
      std::env::var("FITFLIX_API_BASE_URL").ok(),
      std::env::var("FITFLIX_API_TIMEOUT").ok(),
    )
  }

  fn with_overrides(mut self, base_url: Option<String>, timeout_ms: Option<String>) -> Result<Self> {
    if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
      self.api.base_url = url;
    }
    if let Some(raw) = timeout_ms.filter(|t| !t.trim().is_empty()) {
      self.api.timeout_ms = raw
        .trim()
        .parse()
        .map_err(|e| eyre!("Invalid FITFLIX_API_TIMEOUT '{}': {}", raw, e))?;
    }
    Ok(self)
  }

  /// Directory for local state and log files.
  pub fn data_dir(&self) -> Result<PathBuf> {
    match &self.data_dir {
      Some(dir) => Ok(dir.clone()),
      None => crate::storage::SqliteStore::default_dir(),
    }
  }
}
