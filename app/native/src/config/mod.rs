//! Configuration module for Skypaper.
//!
//! This module provides configuration types and loading functionality.
//!
//! The configuration file supports JSONC format (JSON with comments).
//! Both single-line (`//`) and multi-line (`/* */`) comments are allowed.

pub mod template;
pub mod types;

use std::path::PathBuf;
use std::sync::OnceLock;

pub use types::{
    ConfigError, DEFAULT_INTERVAL_MINUTES, FetchConfig, SkypaperConfig, config_paths,
    load_config as load_config_default, load_config_from_path,
};

/// Global configuration instance, loaded once at startup.
static CONFIG: OnceLock<SkypaperConfig> = OnceLock::new();

/// Path to the currently loaded configuration file.
static CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Custom config path override (set via CLI --config flag).
static CUSTOM_CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Sets a custom configuration file path to use instead of the default search paths.
///
/// This must be called before `init()` or `get_config()` to take effect.
///
/// # Returns
///
/// `true` if the path was set successfully, `false` if a path was already set.
pub fn set_custom_config_path(path: PathBuf) -> bool { CUSTOM_CONFIG_PATH.set(path).is_ok() }

/// Returns the custom configuration path, if one was set.
pub fn custom_config_path() -> Option<&'static PathBuf> { CUSTOM_CONFIG_PATH.get() }

/// Loads the configuration from disk.
///
/// Returns the loaded configuration, or a default configuration if loading fails.
/// If no configuration file exists at the default locations, writes a template there.
fn load_or_default() -> SkypaperConfig {
    let result = CUSTOM_CONFIG_PATH.get().map_or_else(load_config_default, |path| {
        load_config_from_path(path)
    });

    match result {
        Ok((config, path)) => {
            tracing::debug!(path = %path.display(), "loaded configuration");
            let _ = CONFIG_PATH.set(path);
            config
        }
        Err(ConfigError::NotFound) => {
            if let Some(path) = CUSTOM_CONFIG_PATH.get() {
                tracing::warn!(
                    path = %path.display(),
                    "configuration file not found, using defaults"
                );
            } else {
                create_default_config_file();
            }
            SkypaperConfig::default()
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to load configuration, using defaults");
            SkypaperConfig::default()
        }
    }
}

/// Creates a template configuration file at the default location.
fn create_default_config_file() {
    let Some(config_path) = config_paths().into_iter().next() else {
        tracing::debug!("no config path available for creating template");
        return;
    };

    if config_path.exists() {
        return;
    }

    match template::create_config_file(&config_path) {
        Ok(()) => {
            let _ = CONFIG_PATH.set(config_path.clone());
            tracing::info!(
                path = %config_path.display(),
                "created default configuration file"
            );
        }
        Err(err) => {
            tracing::debug!(
                error = %err,
                path = %config_path.display(),
                "failed to create default configuration file"
            );
        }
    }
}

/// Initializes and returns the global configuration instance.
///
/// This function is idempotent - calling it multiple times will return
/// the same configuration instance.
pub fn init() -> &'static SkypaperConfig { CONFIG.get_or_init(load_or_default) }

/// Returns the global configuration instance, initializing it if necessary.
pub fn get_config() -> &'static SkypaperConfig { CONFIG.get_or_init(load_or_default) }

/// Returns the path to the loaded configuration file, if any.
pub fn get_config_path() -> Option<&'static PathBuf> { CONFIG_PATH.get() }

/// Returns the JSON Schema of the configuration file, pretty printed.
///
/// # Errors
///
/// Returns an error if the schema cannot be serialized.
pub fn schema_json() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(SkypaperConfig);
    serde_json::to_string_pretty(&schema)
}
