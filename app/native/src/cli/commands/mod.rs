//! CLI command definitions using Clap.
//!
//! - `wallpaper` - `run`, `daemon` and `sources`
//! - `config_cmd` - Configuration file management

use std::io;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Generator, Shell, generate};

use crate::config;
use crate::error::SkypaperError;
use crate::platform::resolve_cli_path;

pub mod config_cmd;
pub mod wallpaper;

pub use config_cmd::ConfigCommands;
pub use wallpaper::{DaemonArgs, RunArgs, SourceOverrides};

/// Application version from Cargo.toml.
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Skypaper - live satellite and astronomy wallpapers.
#[derive(Parser, Debug)]
#[command(name = "skypaper")]
#[command(author, version = APP_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a custom configuration file.
    ///
    /// Overrides the default configuration file search paths.
    /// Supports JSONC format (JSON with comments).
    #[arg(long, short, global = true, value_name = "PATH")]
    pub config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum Commands {
    /// Download the current image and set it as the wallpaper.
    #[command(after_long_help = r#"Examples:
  skypaper run                              # Configured source
  skypaper run --source earth-h8-16         # 4x4 Himawari-8 mosaic
  skypaper run --source moon-nasa --fill natural
  skypaper run --download-only --json       # Only write the file, print JSON"#)]
    Run(RunArgs),

    /// Keep the wallpaper up to date until interrupted.
    #[command(after_long_help = r#"Examples:
  skypaper daemon                           # Configured interval (default 10 min)
  skypaper daemon --interval 60             # Hourly
  skypaper daemon --no-initial-run          # First update after one interval"#)]
    Daemon(DaemonArgs),

    /// List the supported imagery sources.
    Sources {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration file management commands.
    ///
    /// Initialize, locate, and inspect the configuration file.
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Output the configuration JSON Schema.
    ///
    /// Can be redirected to a file for use with editors that support JSON
    /// Schema validation.
    Schema,

    /// Generate shell completions.
    ///
    /// Usage:
    ///   eval "$(skypaper completions --shell zsh)"
    ///   skypaper completions --shell fish > ~/.config/fish/completions/skypaper.fish
    #[command(verbatim_doc_comment)]
    Completions {
        /// The shell to generate completions for.
        #[arg(long, short, value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Returns the custom config path if specified via --config flag.
    #[must_use]
    pub fn config_path(&self) -> Option<std::path::PathBuf> {
        self.config.as_deref().map(resolve_cli_path)
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command execution fails.
    pub fn execute(&self) -> Result<(), SkypaperError> {
        if let Some(path) = self.config_path() {
            if !path.exists() {
                return Err(SkypaperError::ConfigError(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            config::set_custom_config_path(path);
        }

        match &self.command {
            Commands::Run(args) => wallpaper::execute_run(args),
            Commands::Daemon(args) => wallpaper::execute_daemon(args),
            Commands::Sources { json } => wallpaper::execute_sources(*json),
            Commands::Config(cmd) => config_cmd::execute(cmd),
            Commands::Schema => {
                println!("{}", config::schema_json()?);
                Ok(())
            }
            Commands::Completions { shell } => {
                Self::print_completions(*shell);
                Ok(())
            }
        }
    }

    fn print_completions<G: Generator>(generator: G) {
        let mut cmd = Self::command();
        generate(generator, &mut cmd, "skypaper", &mut io::stdout());
    }
}
