//! Wallpaper CLI commands.
//!
//! `run`, `daemon` and `sources`. Configuration values are read once and can
//! be overridden per invocation.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use clap::Args;
use colored::Colorize;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

use crate::cli::output;
use crate::config::{self, SkypaperConfig};
use crate::error::SkypaperError;
use crate::platform::resolve_cli_path;
use crate::scheduler::{OutcomeHandler, Scheduler, interval_from_minutes};
use crate::sources::{Catalog, SourceId};
use crate::wallpaper::{Fetcher, FillMode, PlatformApplier, RunCoordinator};

/// Maximum width of the URL column in the sources table.
const URL_COLUMN_WIDTH: usize = 72;

/// Overrides shared by `run` and `daemon`.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOverrides {
    /// Imagery source (earth-h8, earth-h8-16, moon-nasa, sun-nasa).
    /// Default: the configured source.
    #[arg(long, short, value_name = "ID")]
    pub source: Option<String>,

    /// Directory the wallpaper is written to.
    #[arg(long, short, value_name = "DIR")]
    pub output: Option<String>,

    /// Keep the timestamped file name instead of overwriting wallpaper.<ext>.
    #[arg(long)]
    pub keep_history: bool,

    /// How the image is fitted to the screen: natural or fill.
    #[arg(long, value_name = "MODE")]
    pub fill: Option<FillMode>,
}

/// Arguments of `skypaper run`.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    #[command(flatten)]
    pub overrides: SourceOverrides,

    /// Download and compose only; leave the desktop untouched.
    #[arg(long)]
    pub download_only: bool,

    /// Print the run outcome as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments of `skypaper daemon`.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonArgs {
    #[command(flatten)]
    pub overrides: SourceOverrides,

    /// Minutes between two updates. 0 runs once and exits.
    /// Default: the configured interval.
    #[arg(long, short, value_name = "MINUTES")]
    pub interval: Option<u64>,

    /// Wait one full interval before the first update.
    #[arg(long)]
    pub no_initial_run: bool,
}

/// Settings of one invocation after applying overrides to the configuration.
#[derive(Debug, Clone)]
struct Settings {
    source: SourceId,
    catalog: Catalog,
}

impl Settings {
    fn resolve(
        config: &SkypaperConfig,
        config_dir: Option<&Path>,
        overrides: &SourceOverrides,
    ) -> Result<Self, SkypaperError> {
        let source = match overrides.source.as_deref() {
            Some(id) => id.parse::<SourceId>()?,
            None => config.source,
        };

        let output_dir = overrides
            .output
            .as_deref()
            .map_or_else(|| config.resolved_output_dir(config_dir), resolve_cli_path);

        let catalog = Catalog::new(output_dir)
            .with_keep_history(config.keep_history || overrides.keep_history)
            .with_fill_mode(overrides.fill.or(config.fill_mode));

        Ok(Self { source, catalog })
    }
}

fn build_coordinator(
    config: &SkypaperConfig,
    overrides: &SourceOverrides,
    download_only: bool,
) -> Result<RunCoordinator, SkypaperError> {
    let config_dir = config::get_config_path().and_then(|path| path.parent());
    let settings = Settings::resolve(config, config_dir, overrides)?;
    let fetcher = Fetcher::http(config.fetch.to_options())?;
    let applier =
        if download_only { PlatformApplier::disabled() } else { PlatformApplier::detect() };

    tracing::debug!(
        source = %settings.source,
        output_dir = %settings.catalog.output_dir().display(),
        applier = applier.name(),
        "configured run"
    );

    Ok(RunCoordinator::new(settings.source.as_str(), settings.catalog, fetcher, applier))
}

/// Runs the pipeline once in the foreground.
///
/// # Errors
///
/// Returns an error if the arguments are invalid or the run fails.
pub fn execute_run(args: &RunArgs) -> Result<(), SkypaperError> {
    let config = config::get_config();
    let coordinator = build_coordinator(config, &args.overrides, args.download_only)?;

    let outcome = coordinator
        .run_now()
        .ok_or_else(|| SkypaperError::CommandError("A run is already in progress".to_string()))?;

    output::print_outcome(&outcome, args.json)?;

    if outcome.success {
        Ok(())
    } else {
        Err(SkypaperError::WallpaperError(outcome.message))
    }
}

/// Keeps the wallpaper up to date until the process is interrupted.
///
/// # Errors
///
/// Returns an error if the arguments are invalid or the timer cannot start.
pub fn execute_daemon(args: &DaemonArgs) -> Result<(), SkypaperError> {
    let config = config::get_config();
    let coordinator = Arc::new(build_coordinator(config, &args.overrides, false)?);
    let minutes = args.interval.unwrap_or(config.interval);

    let Some(interval) = interval_from_minutes(minutes) else {
        tracing::info!("interval is 0, running once");
        return execute_once(&coordinator);
    };

    let handler: OutcomeHandler = Arc::new(|outcome| {
        if let Err(err) = output::print_outcome(&outcome, false) {
            tracing::warn!(error = %err, "failed to print run outcome");
        }
    });
    let _scheduler = Scheduler::start(coordinator, interval, !args.no_initial_run, handler)?;

    println!(
        "{} updating every {minutes} min. Press Ctrl+C to stop.",
        "skypaper".bold()
    );
    loop {
        thread::park();
    }
}

fn execute_once(coordinator: &RunCoordinator) -> Result<(), SkypaperError> {
    let Some(outcome) = coordinator.run_now() else {
        return Ok(());
    };
    output::print_outcome(&outcome, false)?;
    if outcome.success { Ok(()) } else { Err(SkypaperError::WallpaperError(outcome.message)) }
}

/// Lists the supported sources with the URL each resolves to right now.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute_sources(json: bool) -> Result<(), SkypaperError> {
    #[derive(Tabled)]
    struct SourceRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: &'static str,
        #[tabled(rename = "Updates")]
        cadence: &'static str,
        #[tabled(rename = "Tiles")]
        tiles: usize,
        #[tabled(rename = "URL")]
        url: String,
    }

    let sources = Catalog::describe(Utc::now());

    if json {
        output::print_highlighted_json(&serde_json::to_value(&sources)?);
        return Ok(());
    }

    let configured = config::get_config().source;
    let rows: Vec<SourceRow> = sources
        .iter()
        .map(|info| SourceRow {
            id: if info.id == configured {
                format!("{} *", info.id).green().to_string()
            } else {
                info.id.to_string()
            },
            name: info.name,
            cadence: info.cadence,
            tiles: info.tiles,
            url: output::truncate(&info.url, URL_COLUMN_WIDTH),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();

    println!("{}", format!("Sources ({})", sources.len()).bold());
    println!("{table}");
    println!("{}", "* configured source".dimmed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn config() -> SkypaperConfig {
        SkypaperConfig { output_dir: "/srv/walls".to_string(), ..Default::default() }
    }

    #[test]
    fn test_settings_default_to_config() {
        let settings = Settings::resolve(&config(), None, &SourceOverrides::default()).unwrap();
        assert_eq!(settings.source, SourceId::EarthH8);
        assert_eq!(settings.catalog.output_dir(), PathBuf::from("/srv/walls"));
    }

    #[test]
    fn test_settings_apply_overrides() {
        let overrides = SourceOverrides {
            source: Some("Moon-NASA".to_string()),
            output: Some("/tmp/moon".to_string()),
            keep_history: true,
            fill: Some(FillMode::Fill),
        };
        let settings = Settings::resolve(&config(), None, &overrides).unwrap();

        assert_eq!(settings.source, SourceId::MoonNasa);
        assert_eq!(settings.catalog.output_dir(), PathBuf::from("/tmp/moon"));

        let request = settings.catalog.resolve_source(settings.source, Utc::now()).unwrap();
        assert_eq!(request.fill_mode, FillMode::Fill);
        assert!(request.target_name.starts_with("moon_"));
    }

    #[test]
    fn test_relative_output_resolves_against_cwd() {
        let overrides = SourceOverrides { output: Some("walls".to_string()), ..Default::default() };
        let settings = Settings::resolve(&config(), None, &overrides).unwrap();
        assert!(settings.catalog.output_dir().is_absolute());
        assert!(settings.catalog.output_dir().ends_with("walls"));
    }

    #[test]
    fn test_relative_config_output_resolves_against_config_dir() {
        let config = SkypaperConfig { output_dir: "walls".to_string(), ..Default::default() };
        let settings = Settings::resolve(
            &config,
            Some(Path::new("/etc/skypaper")),
            &SourceOverrides::default(),
        )
        .unwrap();
        assert_eq!(settings.catalog.output_dir(), PathBuf::from("/etc/skypaper/walls"));
    }

    #[test]
    fn test_unknown_source_is_invalid_arguments() {
        let overrides = SourceOverrides { source: Some("mars".to_string()), ..Default::default() };
        let err = Settings::resolve(&config(), None, &overrides).unwrap_err();
        assert!(matches!(err, SkypaperError::InvalidArguments(_)));
        assert!(err.to_string().contains("mars"));
    }

    #[test]
    fn test_download_only_uses_disabled_applier() {
        let coordinator = build_coordinator(&config(), &SourceOverrides::default(), true).unwrap();
        assert_eq!(coordinator.source(), "earth-h8");
        assert!(!coordinator.is_running());
    }
}
