//! Wallpaper source catalog.
//!
//! Maps a source id and a UTC instant to a fully resolved [`WallpaperRequest`].
//! Everything here is pure: no I/O, no clocks, no shared state. Calling
//! [`Catalog::resolve`] twice with the same instant yields the same request.
//!
//! Supported sources:
//!
//! - `earth-h8` - Himawari-8 full disk, single 550px image, 10-minute cadence
//! - `earth-h8-16` - Himawari-8 full disk as a 4x4 grid of 550px tiles
//! - `moon-nasa` - NASA SVS hourly moon phase frame for the current year
//! - `sun-nasa` - latest SDO HMI continuum image, cropped to hide the legend

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::wallpaper::{ErrorKind, FillMode, GridSpec, PipelineResult, PostProcess, WallpaperRequest};

/// Base URL of the Himawari-8 image mirror.
const HIMAWARI_BASE: &str = "https://himawari8-dl.nict.go.jp/himawari.asia/img/D531106";

/// Himawari tile edge length in pixels.
const HIMAWARI_TILE_SIZE: u32 = 550;

/// Grid dimension of the high resolution Himawari mosaic.
const HIMAWARI_GRID: u32 = 4;

/// Minutes subtracted from "now" so we never ask for an image that is not published yet.
pub const PUBLISH_DELAY_MINUTES: i64 = 30;

/// Himawari publishes one full disk image every 10 minutes.
pub const WINDOW_MINUTES: u32 = 10;

/// NASA SVS moon phase frame sets, one per calendar year.
///
/// Frame numbers restart every year, so the year picks the set.
const MOON_FRAME_SETS: &[(i32, &str)] = &[(2024, "a005100/a005187"), (2025, "a005400/a005415")];

const MOON_FRAME_BASE: &str = "https://svs.gsfc.nasa.gov/vis/a000000";

const SUN_URL: &str = "https://sdo.gsfc.nasa.gov/assets/img/latest/latest_1024_HMIIC.jpg";

/// SDO frames are 1024x1024 with a caption strip at the bottom.
const SUN_CROP_HEIGHT: u32 = 985;

/// File stem used when historical copies are not kept.
const FIXED_STEM: &str = "wallpaper";

/// Identifier of a supported imagery source.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum SourceId {
    /// Himawari-8 full disk, single image.
    #[default]
    #[serde(rename = "earth-h8", alias = "Earth-H8")]
    EarthH8,
    /// Himawari-8 full disk, 4x4 tile mosaic.
    #[serde(rename = "earth-h8-16", alias = "Earth-H8-16")]
    EarthH8Grid,
    /// NASA moon phase of the current hour.
    #[serde(rename = "moon-nasa", alias = "Moon-NASA")]
    MoonNasa,
    /// Latest NASA SDO sun image.
    #[serde(rename = "sun-nasa", alias = "Sun-NASA")]
    SunNasa,
}

impl SourceId {
    /// All sources in display order.
    pub const ALL: [Self; 4] = [Self::EarthH8, Self::EarthH8Grid, Self::MoonNasa, Self::SunNasa];

    /// Canonical id string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EarthH8 => "earth-h8",
            Self::EarthH8Grid => "earth-h8-16",
            Self::MoonNasa => "moon-nasa",
            Self::SunNasa => "sun-nasa",
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::EarthH8 => "Earth (Himawari-8)",
            Self::EarthH8Grid => "Earth (Himawari-8, 4x4 mosaic)",
            Self::MoonNasa => "Moon phase (NASA SVS)",
            Self::SunNasa => "Sun (NASA SDO)",
        }
    }

    /// How often the source publishes a new image.
    #[must_use]
    pub const fn cadence(self) -> &'static str {
        match self {
            Self::EarthH8 | Self::EarthH8Grid => "10 minutes",
            Self::MoonNasa => "1 hour",
            Self::SunNasa => "~15 minutes",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for SourceId {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| ErrorKind::UnknownSource(s.trim().to_string()))
    }
}

/// Summary of a source for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub id: SourceId,
    pub name: &'static str,
    pub cadence: &'static str,
    pub tiles: usize,
    /// First URL the source resolves to at the listing instant.
    pub url: String,
    pub file_name: String,
}

/// Resolves sources into requests for a fixed output location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    output_dir: PathBuf,
    keep_history: bool,
    fill_override: Option<FillMode>,
}

impl Catalog {
    /// Creates a catalog writing into `output_dir` with a fixed file name.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            keep_history: false,
            fill_override: None,
        }
    }

    /// Keep every image under its timestamped name instead of overwriting one file.
    #[must_use]
    pub const fn with_keep_history(mut self, keep_history: bool) -> Self {
        self.keep_history = keep_history;
        self
    }

    /// Forces a fill mode instead of the per-source default.
    #[must_use]
    pub const fn with_fill_mode(mut self, fill_mode: Option<FillMode>) -> Self {
        self.fill_override = fill_mode;
        self
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path { &self.output_dir }

    /// Resolves a source id string.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::UnknownSource` for ids outside the catalog.
    pub fn resolve(&self, source_id: &str, now: DateTime<Utc>) -> PipelineResult<WallpaperRequest> {
        let source = source_id.parse::<SourceId>()?;
        self.resolve_source(source, now)
    }

    /// Resolves a known source.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::InvalidRequest` only if a source template is broken.
    pub fn resolve_source(
        &self,
        source: SourceId,
        now: DateTime<Utc>,
    ) -> PipelineResult<WallpaperRequest> {
        let resolved = resolve_urls(source, now);

        let target_name = if self.keep_history {
            resolved.file_name
        } else {
            fixed_name(&resolved.file_name)
        };

        let fill_mode = self.fill_override.unwrap_or(if resolved.compose {
            FillMode::Fill
        } else {
            FillMode::Natural
        });

        WallpaperRequest {
            source,
            urls: resolved.urls,
            target_name,
            output_dir: self.output_dir.clone(),
            compose: resolved.compose,
            grid: resolved.grid,
            fill_mode,
            post_process: resolved.post_process,
        }
        .validated()
    }

    /// Lists every source as it resolves at `now`.
    #[must_use]
    pub fn describe(now: DateTime<Utc>) -> Vec<SourceInfo> {
        SourceId::ALL
            .into_iter()
            .map(|id| {
                let resolved = resolve_urls(id, now);
                SourceInfo {
                    id,
                    name: id.display_name(),
                    cadence: id.cadence(),
                    tiles: resolved.urls.len(),
                    url: resolved.urls.first().cloned().unwrap_or_default(),
                    file_name: resolved.file_name,
                }
            })
            .collect()
    }
}

/// URL set and naming produced by a source before catalog options are applied.
struct Resolved {
    urls: Vec<String>,
    file_name: String,
    compose: bool,
    grid: GridSpec,
    post_process: PostProcess,
}

fn resolve_urls(source: SourceId, now: DateTime<Utc>) -> Resolved {
    match source {
        SourceId::EarthH8 => {
            let window = himawari_window(now);
            Resolved {
                urls: vec![format!(
                    "{HIMAWARI_BASE}/1d/{HIMAWARI_TILE_SIZE}/{}00_0_0.png",
                    window.format("%Y/%m/%d/%H%M")
                )],
                file_name: format!("himawari8_1x1_{}.png", window.format("%Y_%m_%d_%H_%M")),
                compose: false,
                grid: GridSpec::single(HIMAWARI_TILE_SIZE),
                post_process: PostProcess::None,
            }
        }
        SourceId::EarthH8Grid => {
            let window = himawari_window(now);
            let stamp = window.format("%Y/%m/%d/%H%M");
            let grid = GridSpec {
                rows: HIMAWARI_GRID,
                cols: HIMAWARI_GRID,
                tile_size: HIMAWARI_TILE_SIZE,
            };
            // Himawari tile names are `{col}_{row}`; columns vary fastest.
            let urls = (0..grid.rows)
                .flat_map(|row| (0..grid.cols).map(move |col| (row, col)))
                .map(|(row, col)| {
                    format!(
                        "{HIMAWARI_BASE}/{HIMAWARI_GRID}d/{HIMAWARI_TILE_SIZE}/{stamp}00_{col}_{row}.png"
                    )
                })
                .collect();
            Resolved {
                urls,
                file_name: format!("himawari8_4x4_{}.png", window.format("%Y_%m_%d_%H_%M")),
                compose: true,
                grid,
                post_process: PostProcess::None,
            }
        }
        SourceId::MoonNasa => {
            let frame = moon_frame(now);
            Resolved {
                urls: vec![format!(
                    "{MOON_FRAME_BASE}/{}/frames/730x730_1x1_30p/moon.{frame}.jpg",
                    moon_frame_set(now.year())
                )],
                file_name: format!("moon_{frame}.jpg"),
                compose: false,
                grid: GridSpec::single(730),
                post_process: PostProcess::None,
            }
        }
        SourceId::SunNasa => Resolved {
            urls: vec![SUN_URL.to_string()],
            file_name: "sun.jpg".to_string(),
            compose: false,
            grid: GridSpec::single(1024),
            post_process: PostProcess::CropHeight(SUN_CROP_HEIGHT),
        },
    }
}

/// Rounds `instant` down to the start of its `minutes`-long window.
#[must_use]
pub fn round_down_to_window(instant: DateTime<Utc>, minutes: u32) -> DateTime<Utc> {
    let minutes = minutes.max(1);
    instant
        .with_minute(instant.minute() - instant.minute() % minutes)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(instant)
}

/// The latest Himawari window that is expected to be published at `now`.
#[must_use]
pub fn himawari_window(now: DateTime<Utc>) -> DateTime<Utc> {
    round_down_to_window(now - Duration::minutes(PUBLISH_DELAY_MINUTES), WINDOW_MINUTES)
}

/// One-based hour index within the year: `floor(hours since Jan 1 00:00) + 1`.
#[must_use]
pub fn moon_frame(now: DateTime<Utc>) -> i64 {
    Utc.with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
        .single()
        .map_or(1, |start| (now - start).num_hours() + 1)
}

/// Path segment of the moon frame set for `year`.
///
/// Years past the table reuse the newest set; years before it use the oldest.
#[must_use]
pub fn moon_frame_set(year: i32) -> &'static str {
    MOON_FRAME_SETS
        .iter()
        .rev()
        .find(|(set_year, _)| *set_year <= year)
        .or_else(|| MOON_FRAME_SETS.first())
        .map_or("", |(_, suffix)| *suffix)
}

/// `wallpaper.{ext}` keeping the extension of the source file name.
fn fixed_name(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or_else(|| FIXED_STEM.to_string(), |ext| format!("{FIXED_STEM}.{ext}"))
}
