//! Error types for the wallpaper pipeline.
//!
//! Every stage of a run (resolve, fetch, compose, apply) reports failures with
//! a single [`ErrorKind`]. The coordinator never lets one escape: it wraps the
//! first failure of a run into a [`RunOutcome`](super::RunOutcome).
//!
//! # Error Categories
//!
//! - **Request errors**: unknown source, malformed request
//! - **Network errors**: a tile exhausted its download attempts
//! - **Image errors**: decode failures and filesystem failures while composing
//! - **Platform errors**: unsupported OS, missing file, failed OS call

use serde::Serialize;
use thiserror::Error;

/// Result type alias for pipeline stages.
pub type PipelineResult<T> = Result<T, ErrorKind>;

/// Errors that can end a wallpaper run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "details")]
pub enum ErrorKind {
    /// The requested source id is not in the catalog.
    #[error("Unknown wallpaper source: {0}")]
    UnknownSource(String),

    /// The request violates a structural invariant (empty URL list, grid size mismatch).
    #[error("Invalid wallpaper request: {0}")]
    InvalidRequest(String),

    /// A tile could not be downloaded within the attempt budget.
    ///
    /// `cause` is the error of the last attempt.
    #[error("Failed to download {url}: {cause}")]
    DownloadFailed {
        /// URL that exhausted its attempts.
        url: String,
        /// Reason the final attempt failed.
        cause: String,
    },

    /// A downloaded file is not a decodable image.
    ///
    /// Corrupt tiles are never re-fetched automatically.
    #[error("Failed to decode image {path}: {cause}")]
    ImageDecodeFailed {
        /// Path of the file that failed to decode.
        path: String,
        /// Decoder error.
        cause: String,
    },

    /// Writing, renaming or encoding the final image failed.
    #[error("Failed to write wallpaper: {0}")]
    CompositionIOFailed(String),

    /// No wallpaper strategy exists for the running operating system.
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The image to install does not exist.
    #[error("Wallpaper file not found: {0}")]
    FileNotFound(String),

    /// The operating system rejected the wallpaper change.
    #[error("Failed to set wallpaper: {0}")]
    ApplyFailed(String),

    /// A stage panicked; the run was aborted.
    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl ErrorKind {
    /// Shorthand for a decode failure at `path`.
    pub fn decode(path: &std::path::Path, cause: impl std::fmt::Display) -> Self {
        Self::ImageDecodeFailed {
            path: path.display().to_string(),
            cause: cause.to_string(),
        }
    }

    /// Shorthand for a filesystem failure with context.
    pub fn io(context: &str, err: impl std::fmt::Display) -> Self {
        Self::CompositionIOFailed(format!("{context}: {err}"))
    }
}
