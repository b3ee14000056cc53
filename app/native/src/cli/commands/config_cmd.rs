//! Config CLI commands.
//!
//! Commands for managing the Skypaper configuration file.

use std::path::PathBuf;

use clap::Subcommand;
use colored::Colorize;

use crate::cli::output;
use crate::config::template::{create_config_file, generate_config_template};
use crate::config::{self, config_paths};
use crate::error::SkypaperError;
use crate::platform::resolve_cli_path;

/// Config management commands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
#[command(next_display_order = None)]
pub enum ConfigCommands {
    /// Initialize a new configuration file with all options documented.
    ///
    /// Creates a new configuration file at the default location with all
    /// available options commented out.
    #[command(
        name = "init",
        after_long_help = r#"Examples:
  skypaper config init              # Create config at default location
  skypaper config init --force      # Overwrite existing config
  skypaper config init --path ~/skypaper.jsonc  # Create at custom path
  skypaper config init --stdout     # Print template to stdout"#
    )]
    Init {
        /// Overwrite existing configuration file if it exists.
        #[arg(long, short)]
        force: bool,

        /// Custom path for the configuration file.
        /// If not specified, uses ~/.config/skypaper/config.jsonc
        #[arg(long, short, value_name = "PATH")]
        path: Option<String>,

        /// Print the configuration template to stdout instead of writing to a file.
        #[arg(long)]
        stdout: bool,
    },

    /// Show the configuration file search paths.
    ///
    /// Indicates which file is currently in use (if any).
    Path,

    /// Show the effective configuration.
    ///
    /// Prints the configuration after defaults are applied, as JSON.
    Show,
}

/// Execute config subcommands.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cmd: &ConfigCommands) -> Result<(), SkypaperError> {
    match cmd {
        ConfigCommands::Init { force, path, stdout } => {
            if *stdout {
                println!("{}", generate_config_template());
                Ok(())
            } else {
                let path = path.as_deref().map(resolve_cli_path);
                init_config(*force, path).map(|created| {
                    println!("Configuration file created at: {}", created.display());
                    println!("\nAll options are commented out by default.");
                    println!("Edit the file and uncomment the options you want to configure.");
                })
            }
        }
        ConfigCommands::Path => {
            show_config_path();
            Ok(())
        }
        ConfigCommands::Show => show_config(),
    }
}

/// Writes the template and returns the path it was written to.
fn init_config(force: bool, custom_path: Option<PathBuf>) -> Result<PathBuf, SkypaperError> {
    let config_path = custom_path
        .or_else(|| config_paths().into_iter().next())
        .unwrap_or_else(|| PathBuf::from("config.jsonc"));

    if config_path.exists() && !force {
        return Err(SkypaperError::ConfigError(format!(
            "Configuration file already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        )));
    }

    create_config_file(&config_path).map_err(|e| {
        SkypaperError::ConfigError(format!(
            "Failed to create config file {}: {e}",
            config_path.display()
        ))
    })?;

    Ok(config_path)
}

fn show_config_path() {
    if let Some(custom) = config::custom_config_path() {
        println!("Using --config: {}", custom.display());
        return;
    }

    println!("Configuration file search paths (in priority order):\n");

    let mut found_config = false;
    for (i, path) in config_paths().iter().enumerate() {
        let exists = path.exists();
        let marker = if exists && !found_config {
            found_config = true;
            " (active)".green().to_string()
        } else if exists {
            " (exists)".dimmed().to_string()
        } else {
            String::new()
        };

        println!("  {}. {}{}", i + 1, path.display(), marker);
    }

    if !found_config {
        println!("\nNo configuration file found.");
        println!("Run 'skypaper config init' to create one.");
    }
}

fn show_config() -> Result<(), SkypaperError> {
    let config = config::get_config();
    let config_path = config::get_config_path();
    match config_path {
        Some(path) => println!("{} {}", "Loaded from".dimmed(), path.display()),
        None => println!("{}", "No configuration file loaded, showing defaults".dimmed()),
    }
    output::print_highlighted_json(&serde_json::to_value(config)?);
    println!(
        "{} {}",
        "Output directory:".dimmed(),
        config.resolved_output_dir(config_path.and_then(|path| path.parent())).display()
    );
    Ok(())
}
