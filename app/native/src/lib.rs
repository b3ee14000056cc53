//! Skypaper - live satellite and astronomy imagery as your desktop wallpaper.
//!
//! A run resolves a [`sources::SourceId`] into one or more image URLs,
//! downloads them with retries, composes tiled sources into a single image,
//! and installs the result as the desktop background:
//!
//! - [`sources`] - Source catalog and URL resolution
//! - [`wallpaper`] - Download, composition, and platform pipeline
//! - [`scheduler`] - Periodic trigger for daemon mode
//! - [`config`] - JSONC configuration file
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod error;
pub mod platform;
pub mod scheduler;
pub mod sources;
pub mod wallpaper;

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "skypaper_lib=info,skypaper=info";

/// Installs the global tracing subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over [`DEFAULT_LOG_FILTER`]. Calling this more
/// than once is a no-op.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
