//! Error types for Skypaper.
//!
//! [`SkypaperError`] is what CLI commands return. Pipeline failures use the
//! richer [`ErrorKind`](crate::wallpaper::ErrorKind) and are converted at the
//! command boundary.

use serde::Serialize;
use thiserror::Error;

use crate::wallpaper::ErrorKind;

/// Errors that can occur while running a command.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum SkypaperError {
    /// Invalid command arguments.
    #[error("{0}")]
    InvalidArguments(String),
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// A wallpaper run failed.
    #[error("Wallpaper error: {0}")]
    WallpaperError(String),
    /// IO error.
    #[error("IO error: {0}")]
    IoError(String),
    /// Generic command error.
    #[error("{0}")]
    CommandError(String),
}

impl From<std::io::Error> for SkypaperError {
    fn from(err: std::io::Error) -> Self { Self::IoError(err.to_string()) }
}

impl From<serde_json::Error> for SkypaperError {
    fn from(err: serde_json::Error) -> Self { Self::CommandError(err.to_string()) }
}

impl From<ErrorKind> for SkypaperError {
    fn from(err: ErrorKind) -> Self {
        match err {
            ErrorKind::UnknownSource(_) | ErrorKind::InvalidRequest(_) => {
                Self::InvalidArguments(err.to_string())
            }
            other => Self::WallpaperError(other.to_string()),
        }
    }
}

impl From<String> for SkypaperError {
    fn from(msg: String) -> Self { Self::CommandError(msg) }
}

impl From<&str> for SkypaperError {
    fn from(msg: &str) -> Self { Self::CommandError(msg.to_string()) }
}
