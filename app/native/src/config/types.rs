//! Configuration types for Skypaper.
//!
//! This module provides the configuration types and loading functionality.
//! The configuration file supports JSONC format (JSON with comments).
//! Both single-line (`//`) and multi-line (`/* */`) comments are allowed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::platform::path::{default_output_dir, expand, expand_and_resolve};
use crate::sources::SourceId;
use crate::wallpaper::fetch::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT, DEFAULT_WORKERS, FetchOptions,
};
use crate::wallpaper::FillMode;

/// Default minutes between two runs in daemon mode.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 10;

/// Download behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchConfig {
    /// Attempts per URL before the run fails.
    /// Default: 10
    pub max_attempts: u32,

    /// Seconds to wait between two attempts on the same URL.
    /// Default: 2
    pub retry_delay_secs: u64,

    /// Timeout of a single HTTP request in seconds.
    /// Default: 20
    pub timeout_secs: u64,

    /// Number of tiles downloaded in parallel.
    /// Default: 4
    pub workers: usize,

    /// Skip TLS certificate verification.
    /// Only enable this behind a proxy that re-signs traffic.
    /// Default: false
    pub accept_invalid_certs: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            workers: DEFAULT_WORKERS,
            accept_invalid_certs: false,
        }
    }
}

impl FetchConfig {
    /// Converts into the options consumed by the fetcher.
    #[must_use]
    pub fn to_options(&self) -> FetchOptions {
        FetchOptions {
            max_attempts: self.max_attempts.max(1),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            workers: self.workers.max(1),
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}

/// Root configuration structure for Skypaper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct SkypaperConfig {
    /// Imagery source: "earth-h8", "earth-h8-16", "moon-nasa" or "sun-nasa".
    /// Default: "earth-h8"
    pub source: SourceId,

    /// Directory the wallpaper is written to. Supports `~`.
    /// Empty means `<Pictures>/skypaper`.
    pub output_dir: String,

    /// Keep every image under its timestamped name instead of
    /// overwriting a single `wallpaper.<ext>` file.
    /// Default: false
    pub keep_history: bool,

    /// How the image is fitted to the screen: "natural" or "fill".
    /// Unset means "fill" for tiled sources and "natural" otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_mode: Option<FillMode>,

    /// Minutes between two updates in daemon mode. 0 disables the timer.
    /// Default: 10
    pub interval: u64,

    /// Download settings.
    pub fetch: FetchConfig,
}

impl Default for SkypaperConfig {
    fn default() -> Self {
        Self {
            source: SourceId::default(),
            output_dir: String::new(),
            keep_history: false,
            fill_mode: None,
            interval: DEFAULT_INTERVAL_MINUTES,
            fetch: FetchConfig::default(),
        }
    }
}

impl SkypaperConfig {
    /// Output directory with `~` expanded, or the platform default when unset.
    ///
    /// Relative paths resolve against `config_dir`, the directory of the file
    /// the configuration was loaded from, when there is one.
    #[must_use]
    pub fn resolved_output_dir(&self, config_dir: Option<&Path>) -> PathBuf {
        let resolved = match config_dir {
            Some(dir) => expand_and_resolve(&self.output_dir, dir),
            None => expand(&self.output_dir),
        };
        if resolved.as_os_str().is_empty() { default_output_dir() } else { resolved }
    }
}

/// Errors that can occur when loading the configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// No configuration file was found in any of the expected locations.
    NotFound,
    /// The configuration file exists but could not be read.
    IoError(std::io::Error),
    /// The configuration file contains invalid JSON.
    ParseError(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(
                f,
                "No configuration file found. Expected at ~/.config/skypaper/config.jsonc \
                or config.json"
            ),
            Self::IoError(err) => write!(f, "Failed to read configuration file: {err}"),
            Self::ParseError(err) => write!(f, "Failed to parse configuration file: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            Self::ParseError(err) => Some(err),
            Self::NotFound => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self { Self::IoError(err) }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self { Self::ParseError(err) }
}

/// Configuration file names to search for (in priority order).
const CONFIG_FILE_NAMES: &[&str] = &["config.jsonc", "config.json"];

/// Directory name under the config roots.
const APP_DIR: &str = "skypaper";

/// Returns the possible configuration file paths in priority order.
///
/// The function checks the following locations (both `.jsonc` and `.json` variants):
/// 1. `$XDG_CONFIG_HOME/skypaper/` if set
/// 2. `~/.config/skypaper/`
/// 3. the platform config directory (`~/Library/Application Support/skypaper`,
///    `%APPDATA%\skypaper`)
#[must_use]
pub fn config_paths() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        roots.push(PathBuf::from(xdg_config));
    }
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".config"));
    }
    if let Some(config_dir) = dirs::config_dir() {
        roots.push(config_dir);
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    for root in roots {
        for filename in CONFIG_FILE_NAMES {
            let path = root.join(APP_DIR).join(filename);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths
}

/// Loads the configuration from the first available config file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if no configuration file exists in any of the expected locations.
/// Returns `ConfigError::IoError` if a configuration file exists but could not be read.
/// Returns `ConfigError::ParseError` if the configuration file contains invalid JSON.
pub fn load_config() -> Result<(SkypaperConfig, PathBuf), ConfigError> {
    config_paths()
        .into_iter()
        .find(|path| path.exists())
        .map_or(Err(ConfigError::NotFound), |path| load_config_from_path(&path))
}

/// Loads the configuration from a specific file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if the file does not exist, otherwise the
/// same errors as [`load_config`].
pub fn load_config_from_path(path: &Path) -> Result<(SkypaperConfig, PathBuf), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound);
    }

    let file = fs::File::open(path)?;
    // Strip comments from JSONC before parsing
    let reader = json_comments::StripComments::new(file);
    let config: SkypaperConfig = serde_json::from_reader(reader)?;
    Ok((config, path.to_path_buf()))
}
