//! CLI module for Skypaper.
//!
//! Parses the command line and dispatches to the wallpaper and configuration
//! commands.

mod commands;
mod output;

use clap::Parser;
pub use commands::Cli;

use crate::error::SkypaperError;

/// Runs the CLI.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn run() -> Result<(), SkypaperError> {
    let cli = Cli::parse();
    cli.execute()
}
