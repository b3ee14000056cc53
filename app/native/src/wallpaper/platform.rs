//! Desktop wallpaper installation.
//!
//! One [`WallpaperSetter`] is chosen from the OS identifier when the
//! [`PlatformApplier`] is built and kept for the process lifetime:
//!
//! - **Windows**: the `wallpaper` crate (registry style + `SystemParametersInfo`)
//! - **macOS**: `osascript` driving `NSWorkspace` for every screen
//! - **Linux / BSD**: `gsettings` on the GNOME background schema
//!
//! Shell-based setters go through a [`CommandRunner`] so tests can record the
//! exact OS calls without touching the desktop.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use reqwest::Url;

use super::error::{ErrorKind, PipelineResult};
use super::types::FillMode;

/// `NSImageScaleProportionallyUpOrDown`.
const MAC_SCALING_PROPORTIONAL: u8 = 3;

const GNOME_BACKGROUND_SCHEMA: &str = "org.gnome.desktop.background";

/// OS identifiers served by the freedesktop strategy.
const XDG_OS_IDS: &[&str] =
    &["linux", "freebsd", "openbsd", "netbsd", "dragonfly", "solaris", "illumos"];

/// Runs an external program to completion.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args`.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure when the program cannot be spawned
    /// or exits unsuccessfully.
    fn run(&self, program: &str, args: &[String]) -> Result<(), String>;
}

/// [`CommandRunner`] that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<(), String> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| format!("failed to run {program}: {err}"))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            Err(format!("{program} exited with {}", output.status))
        } else {
            Err(format!("{program} exited with {}: {stderr}", output.status))
        }
    }
}

/// A platform-specific way to install a wallpaper.
pub trait WallpaperSetter: Send + Sync {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    /// Installs the image at `path`, which is known to exist and is absolute.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::ApplyFailed` when the OS rejects the change.
    fn set(&self, path: &Path, mode: FillMode) -> PipelineResult<()>;
}

/// Windows: `WallpaperStyle`/`TileWallpaper` registry values, then `SPI_SETDESKWALLPAPER`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsSetter;

impl WallpaperSetter for WindowsSetter {
    fn name(&self) -> &'static str { "windows" }

    fn set(&self, path: &Path, mode: FillMode) -> PipelineResult<()> {
        let style = match mode {
            FillMode::Fill => ::wallpaper::Mode::Fit,
            FillMode::Natural => ::wallpaper::Mode::Center,
        };
        ::wallpaper::set_mode(style).map_err(|err| ErrorKind::ApplyFailed(err.to_string()))?;

        let path_str = path.display().to_string();
        ::wallpaper::set_from_path(&path_str).map_err(|err| ErrorKind::ApplyFailed(err.to_string()))
    }
}

/// macOS: sets the desktop image of every screen through `NSWorkspace`.
#[derive(Clone)]
pub struct MacSetter {
    runner: Arc<dyn CommandRunner>,
}

impl MacSetter {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self { Self { runner } }
}

impl WallpaperSetter for MacSetter {
    fn name(&self) -> &'static str { "macos" }

    fn set(&self, path: &Path, mode: FillMode) -> PipelineResult<()> {
        let args = vec!["-e".to_string(), mac_script(path, mode)];
        self.runner.run("osascript", &args).map_err(ErrorKind::ApplyFailed)
    }
}

/// Builds the AppleScriptObjC program that installs `path` on all screens.
fn mac_script(path: &Path, mode: FillMode) -> String {
    let allow_clipping = matches!(mode, FillMode::Fill);
    let path = escape_applescript(&path.display().to_string());
    format!(
        r#"use framework "AppKit"
use scripting additions
set imageURL to current application's NSURL's fileURLWithPath:"{path}"
set workspace to current application's NSWorkspace's sharedWorkspace()
set options to current application's NSDictionary's dictionaryWithObjects:{{{MAC_SCALING_PROPORTIONAL}, {allow_clipping}}} forKeys:{{current application's NSWorkspaceDesktopImageScalingKey, current application's NSWorkspaceDesktopImageAllowClippingKey}}
repeat with screen in current application's NSScreen's screens()
    set {{didSet, setError}} to workspace's setDesktopImageURL:imageURL forScreen:screen options:options |error|:(reference)
    if not (didSet as boolean) then error (setError's localizedDescription() as text)
end repeat"#
    )
}

fn escape_applescript(value: &str) -> String { value.replace('\\', "\\\\").replace('"', "\\\"") }

/// Linux and other freedesktop systems: GNOME background settings.
#[derive(Clone)]
pub struct XdgSetter {
    runner: Arc<dyn CommandRunner>,
}

impl XdgSetter {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self { Self { runner } }

    fn gsettings(&self, key: &str, value: &str) -> Result<(), String> {
        let args = ["set", GNOME_BACKGROUND_SCHEMA, key, value].map(str::to_string);
        self.runner.run("gsettings", &args)
    }
}

impl WallpaperSetter for XdgSetter {
    fn name(&self) -> &'static str { "xdg" }

    fn set(&self, path: &Path, mode: FillMode) -> PipelineResult<()> {
        let uri = Url::from_file_path(path)
            .map_err(|()| {
                ErrorKind::ApplyFailed(format!("{} is not an absolute path", path.display()))
            })?
            .to_string();
        self.gsettings("picture-uri", &uri).map_err(ErrorKind::ApplyFailed)?;

        // Only exists on GNOME 42+.
        if let Err(err) = self.gsettings("picture-uri-dark", &uri) {
            tracing::debug!(error = %err, "Could not set dark-mode wallpaper");
        }

        let options = match mode {
            FillMode::Fill => "zoom",
            FillMode::Natural => "scaled",
        };
        self.gsettings("picture-options", options).map_err(ErrorKind::ApplyFailed)
    }
}

enum Strategy {
    Setter(Box<dyn WallpaperSetter>),
    Unsupported(String),
    Disabled,
}

/// Installs finished images as the desktop background.
pub struct PlatformApplier {
    strategy: Strategy,
}

impl std::fmt::Debug for PlatformApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformApplier").field("strategy", &self.name()).finish()
    }
}

impl PlatformApplier {
    /// Applier for the running OS using real processes.
    #[must_use]
    pub fn detect() -> Self { Self::for_os(std::env::consts::OS, Arc::new(SystemCommandRunner)) }

    /// Applier for an explicit OS identifier (as in `std::env::consts::OS`).
    #[must_use]
    pub fn for_os(os: &str, runner: Arc<dyn CommandRunner>) -> Self {
        let strategy = match os {
            "windows" => Strategy::Setter(Box::new(WindowsSetter)),
            "macos" => Strategy::Setter(Box::new(MacSetter::new(runner))),
            other if XDG_OS_IDS.contains(&other) => {
                Strategy::Setter(Box::new(XdgSetter::new(runner)))
            }
            other => Strategy::Unsupported(other.to_string()),
        };
        Self { strategy }
    }

    /// Applier with a custom strategy.
    #[must_use]
    pub fn with_setter(setter: Box<dyn WallpaperSetter>) -> Self {
        Self { strategy: Strategy::Setter(setter) }
    }

    /// Applier that only checks the file exists and never touches the desktop.
    #[must_use]
    pub const fn disabled() -> Self { Self { strategy: Strategy::Disabled } }

    #[must_use]
    pub fn name(&self) -> &str {
        match &self.strategy {
            Strategy::Setter(setter) => setter.name(),
            Strategy::Unsupported(os) => os.as_str(),
            Strategy::Disabled => "disabled",
        }
    }

    /// Installs `path` as the wallpaper.
    ///
    /// # Errors
    ///
    /// - `UnsupportedPlatform` when no strategy exists for this OS
    /// - `FileNotFound` when `path` is not an existing file
    /// - `ApplyFailed` when the OS call fails
    pub fn apply(&self, path: &Path, mode: FillMode) -> PipelineResult<()> {
        if let Strategy::Unsupported(os) = &self.strategy {
            return Err(ErrorKind::UnsupportedPlatform(os.clone()));
        }

        if !path.is_file() {
            return Err(ErrorKind::FileNotFound(path.display().to_string()));
        }

        let Strategy::Setter(setter) = &self.strategy else {
            tracing::debug!(path = %path.display(), "Wallpaper apply disabled");
            return Ok(());
        };

        let absolute = absolute_path(path);
        tracing::debug!(strategy = setter.name(), path = %absolute.display(), %mode, "Applying wallpaper");
        setter.set(&absolute, mode)
    }
}

fn absolute_path(path: &Path) -> PathBuf { path.canonicalize().unwrap_or_else(|_| path.to_path_buf()) }
