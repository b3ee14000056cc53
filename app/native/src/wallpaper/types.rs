//! Data model shared by the pipeline stages.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::error::{ErrorKind, PipelineResult};
use crate::sources::SourceId;

/// How the finished image maps onto the screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    /// Keep the image at its natural size (centered / scaled without cropping).
    #[default]
    Natural,
    /// Fill the screen, cropping or zooming as the platform requires.
    Fill,
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Natural => write!(f, "natural"),
            Self::Fill => write!(f, "fill"),
        }
    }
}

impl FromStr for FillMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "natural" | "center" | "centered" => Ok(Self::Natural),
            "fill" | "fit" | "zoom" => Ok(Self::Fill),
            other => Err(format!("Invalid fill mode '{other}'. Expected 'natural' or 'fill'")),
        }
    }
}

/// Tile grid geometry for composed sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSpec {
    pub rows: u32,
    pub cols: u32,
    /// Edge length of one square tile in pixels.
    pub tile_size: u32,
}

impl GridSpec {
    /// A 1×1 grid, used by sources that deliver a single image.
    pub const fn single(tile_size: u32) -> Self { Self { rows: 1, cols: 1, tile_size } }

    /// Number of tiles in the grid.
    #[must_use]
    pub const fn tile_count(&self) -> usize { (self.rows * self.cols) as usize }

    /// Canvas dimensions `(width, height)` of the composed image.
    #[must_use]
    pub const fn canvas_size(&self) -> (u32, u32) {
        (self.tile_size * self.cols, self.tile_size * self.rows)
    }

    /// Pixel offset of tile `index` in row-major order.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn offset(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        ((index % self.cols) * self.tile_size, (index / self.cols) * self.tile_size)
    }
}

/// Source-specific processing applied to the final image before it is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum PostProcess {
    #[default]
    None,
    /// Keep only the top `n` rows (full width).
    CropHeight(u32),
}

/// A fully resolved request for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallpaperRequest {
    pub source: SourceId,
    pub urls: Vec<String>,
    pub target_name: String,
    pub output_dir: PathBuf,
    pub compose: bool,
    pub grid: GridSpec,
    pub fill_mode: FillMode,
    pub post_process: PostProcess,
}

impl WallpaperRequest {
    /// Validates the request invariants and returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::InvalidRequest` if the URL list is empty, the target
    /// name is empty, or a composed request does not carry exactly one URL per tile.
    pub fn validated(self) -> PipelineResult<Self> {
        if self.urls.is_empty() {
            return Err(ErrorKind::InvalidRequest("request has no URLs".to_string()));
        }
        if self.target_name.trim().is_empty() {
            return Err(ErrorKind::InvalidRequest("target name is empty".to_string()));
        }
        if self.compose && self.urls.len() != self.grid.tile_count() {
            return Err(ErrorKind::InvalidRequest(format!(
                "composed request has {} URLs for a {}x{} grid",
                self.urls.len(),
                self.grid.rows,
                self.grid.cols
            )));
        }
        Ok(self)
    }

    /// Path the finished image is written to.
    #[must_use]
    pub fn final_path(&self) -> PathBuf { self.output_dir.join(&self.target_name) }

    /// Whether this request goes through the grid merge.
    #[must_use]
    pub fn needs_merge(&self) -> bool { self.compose && self.urls.len() > 1 }
}

/// State of one tile download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileOutcome {
    Pending,
    Succeeded,
    Failed(String),
}

/// A single tile owned by the fetcher for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileDownload {
    /// Position in the request's URL list.
    pub index: usize,
    pub url: String,
    pub local_path: PathBuf,
    pub attempts: u32,
    pub outcome: TileOutcome,
}

impl TileDownload {
    /// Creates a pending tile.
    #[must_use]
    pub const fn pending(index: usize, url: String, local_path: PathBuf) -> Self {
        Self {
            index,
            url,
            local_path,
            attempts: 0,
            outcome: TileOutcome::Pending,
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool { self.outcome == TileOutcome::Succeeded }
}

/// The image written to `outputDir/targetName`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositeImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Result of one run, delivered exactly once to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub success: bool,
    pub final_path: Option<PathBuf>,
    pub error: Option<ErrorKind>,
    /// Human-readable status line.
    pub message: String,
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl RunOutcome {
    /// Outcome of a successful run.
    #[must_use]
    pub fn succeeded(
        source: &str,
        final_path: &Path,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        Self {
            success: true,
            final_path: Some(final_path.to_path_buf()),
            error: None,
            message: format!("Wallpaper set to {}", final_path.display()),
            source: source.to_string(),
            started_at,
            elapsed_ms: duration_ms(elapsed),
        }
    }

    /// Outcome of a failed run.
    #[must_use]
    pub fn failed(
        source: &str,
        error: ErrorKind,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        Self {
            success: false,
            final_path: None,
            message: error.to_string(),
            error: Some(error),
            source: source.to_string(),
            started_at,
            elapsed_ms: duration_ms(elapsed),
        }
    }
}

fn duration_ms(elapsed: Duration) -> u64 { u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX) }

#[cfg(test)]
mod tests {
    use super::*;

    fn request(urls: usize, compose: bool) -> WallpaperRequest {
        WallpaperRequest {
            source: SourceId::EarthH8Grid,
            urls: (0..urls).map(|i| format!("https://example.com/{i}.png")).collect(),
            target_name: "out.png".to_string(),
            output_dir: PathBuf::from("/tmp/skypaper"),
            compose,
            grid: GridSpec { rows: 4, cols: 4, tile_size: 550 },
            fill_mode: FillMode::Fill,
            post_process: PostProcess::None,
        }
    }

    // ========================================================================
    // GridSpec
    // ========================================================================

    #[test]
    fn test_grid_canvas_size() {
        let grid = GridSpec { rows: 4, cols: 4, tile_size: 550 };
        assert_eq!(grid.canvas_size(), (2200, 2200));
        assert_eq!(grid.tile_count(), 16);
    }

    #[test]
    fn test_grid_offsets_are_row_major() {
        let grid = GridSpec { rows: 4, cols: 4, tile_size: 550 };
        for i in 0..16 {
            let expected = (((i % 4) * 550) as u32, ((i / 4) * 550) as u32);
            assert_eq!(grid.offset(i), expected, "tile {i}");
        }
    }

    #[test]
    fn test_grid_offsets_non_square() {
        let grid = GridSpec { rows: 2, cols: 3, tile_size: 10 };
        assert_eq!(grid.offset(0), (0, 0));
        assert_eq!(grid.offset(2), (20, 0));
        assert_eq!(grid.offset(3), (0, 10));
        assert_eq!(grid.offset(5), (20, 10));
    }

    // ========================================================================
    // WallpaperRequest validation
    // ========================================================================

    #[test]
    fn test_validated_accepts_full_grid() {
        assert!(request(16, true).validated().is_ok());
    }

    #[test]
    fn test_validated_rejects_empty_urls() {
        let err = request(0, false).validated().unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidRequest(_)));
    }

    #[test]
    fn test_validated_rejects_grid_mismatch() {
        let err = request(15, true).validated().unwrap_err();
        assert!(err.to_string().contains("15 URLs"));
    }

    #[test]
    fn test_validated_ignores_grid_when_not_composing() {
        assert!(request(1, false).validated().is_ok());
    }

    #[test]
    fn test_needs_merge() {
        assert!(request(16, true).needs_merge());
        assert!(!request(1, false).needs_merge());
        assert!(!request(16, false).needs_merge());
    }

    #[test]
    fn test_final_path_joins_output_dir() {
        assert_eq!(request(1, false).final_path(), PathBuf::from("/tmp/skypaper/out.png"));
    }

    // ========================================================================
    // FillMode
    // ========================================================================

    #[test]
    fn test_fill_mode_parse() {
        assert_eq!("fill".parse::<FillMode>().unwrap(), FillMode::Fill);
        assert_eq!("Natural".parse::<FillMode>().unwrap(), FillMode::Natural);
        assert_eq!("centered".parse::<FillMode>().unwrap(), FillMode::Natural);
        assert!("stretch".parse::<FillMode>().is_err());
    }

    #[test]
    fn test_fill_mode_serde_lowercase() {
        assert_eq!(serde_json::to_string(&FillMode::Fill).unwrap(), "\"fill\"");
        let mode: FillMode = serde_json::from_str("\"natural\"").unwrap();
        assert_eq!(mode, FillMode::Natural);
    }

    // ========================================================================
    // RunOutcome
    // ========================================================================

    #[test]
    fn test_failed_outcome_carries_error_message() {
        let err = ErrorKind::FileNotFound("/x.png".to_string());
        let outcome = RunOutcome::failed("sun-nasa", err.clone(), Utc::now(), Duration::ZERO);
        assert!(!outcome.success);
        assert!(outcome.final_path.is_none());
        assert_eq!(outcome.error, Some(err));
        assert!(outcome.message.contains("/x.png"));
    }

    #[test]
    fn test_succeeded_outcome_has_path() {
        let outcome = RunOutcome::succeeded(
            "sun-nasa",
            Path::new("/tmp/sun.jpg"),
            Utc::now(),
            Duration::from_millis(1500),
        );
        assert!(outcome.success);
        assert_eq!(outcome.final_path, Some(PathBuf::from("/tmp/sun.jpg")));
        assert_eq!(outcome.elapsed_ms, 1500);
        assert!(outcome.error.is_none());
    }
}
