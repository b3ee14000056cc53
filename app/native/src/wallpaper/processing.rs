//! Image composition for wallpapers.
//!
//! Turns the downloaded tiles of a run into the single file at
//! `outputDir/targetName`. Grid sources are pasted onto one RGB canvas, single
//! images are validated and promoted, and source-specific crops happen here too.
//!
//! The final file is only ever replaced by rename, so a failed run leaves the
//! previous wallpaper untouched.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, GenericImageView, ImageReader, RgbImage, imageops};
use rayon::prelude::*;
use tempfile::NamedTempFile;

use super::error::{ErrorKind, PipelineResult};
use super::types::{CompositeImage, PostProcess, TileDownload, WallpaperRequest};

/// JPEG quality used for every encoded wallpaper.
const JPEG_QUALITY: u8 = 95;

/// Assembles tiles into the final wallpaper file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor;

impl Compositor {
    #[must_use]
    pub const fn new() -> Self { Self }

    /// Writes the final image for `request` from its downloaded `tiles`.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if no tiles are given, or a grid misses tiles
    /// - `ImageDecodeFailed` if any tile is not a valid image
    /// - `CompositionIOFailed` if encoding or the final rename fails
    pub fn compose(
        &self,
        request: &WallpaperRequest,
        tiles: &[TileDownload],
    ) -> PipelineResult<CompositeImage> {
        let final_path = request.final_path();

        if request.needs_merge() {
            let merged = merge_grid(request, tiles)?;
            let processed = post_process(merged, request.post_process);
            return write_atomic(&processed, &final_path);
        }

        let tile = tiles
            .first()
            .ok_or_else(|| ErrorKind::InvalidRequest("no tile to compose".to_string()))?;

        match request.post_process {
            PostProcess::None => promote(&tile.local_path, &final_path),
            step => {
                let image = decode(&tile.local_path)?;
                write_atomic(&post_process(image, step), &final_path)
            }
        }
    }
}

/// Decodes `tile` in full and renames it onto `final_path`.
///
/// The file bytes are kept exactly as downloaded.
fn promote(tile: &Path, final_path: &Path) -> PipelineResult<CompositeImage> {
    let (width, height) = decode(tile)?.dimensions();

    fs::rename(tile, final_path).map_err(|err| {
        ErrorKind::io(&format!("failed to move {} into place", tile.display()), err)
    })?;

    tracing::debug!(path = %final_path.display(), width, height, "Promoted single image");
    Ok(CompositeImage { path: final_path.to_path_buf(), width, height })
}

/// Pastes every tile at its row-major grid offset.
fn merge_grid(request: &WallpaperRequest, tiles: &[TileDownload]) -> PipelineResult<DynamicImage> {
    let grid = request.grid;
    if tiles.len() != grid.tile_count() {
        return Err(ErrorKind::InvalidRequest(format!(
            "expected {} tiles for a {}x{} grid, got {}",
            grid.tile_count(),
            grid.rows,
            grid.cols,
            tiles.len()
        )));
    }

    let decoded = tiles
        .par_iter()
        .map(|tile| decode(&tile.local_path).map(|image| (tile.index, image.to_rgb8())))
        .collect::<PipelineResult<Vec<_>>>()?;

    let (width, height) = grid.canvas_size();
    let mut canvas = RgbImage::new(width, height);

    for (index, tile) in &decoded {
        let (x, y) = grid.offset(*index);
        imageops::replace(&mut canvas, tile, i64::from(x), i64::from(y));
    }

    tracing::debug!(tiles = decoded.len(), width, height, "Merged tile grid");
    Ok(DynamicImage::ImageRgb8(canvas))
}

/// Applies a source-specific processing step.
fn post_process(image: DynamicImage, step: PostProcess) -> DynamicImage {
    match step {
        PostProcess::None => image,
        PostProcess::CropHeight(limit) => {
            let (width, height) = image.dimensions();
            image.crop_imm(0, 0, width, limit.min(height))
        }
    }
}

fn decode(path: &Path) -> PipelineResult<DynamicImage> {
    ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|err| ErrorKind::decode(path, err))?
        .decode()
        .map_err(|err| ErrorKind::decode(path, err))
}

/// Encodes `image` next to `path`, then renames it over `path`.
///
/// The format follows the extension of `path`: JPEG for `.jpg`/`.jpeg`, PNG otherwise.
pub fn write_atomic(image: &DynamicImage, path: &Path) -> PipelineResult<CompositeImage> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|err| ErrorKind::io(&format!("failed to create temp file in {}", dir.display()), err))?;

    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        encode(image, path, &mut writer)?;
        writer.flush().map_err(|err| ErrorKind::io("failed to flush image", err))?;
    }

    temp.persist(path).map_err(|err| {
        ErrorKind::io(&format!("failed to replace {}", path.display()), err.error)
    })?;

    let (width, height) = image.dimensions();
    tracing::debug!(path = %path.display(), width, height, "Wrote wallpaper");
    Ok(CompositeImage { path: path.to_path_buf(), width, height })
}

fn encode<W: Write>(image: &DynamicImage, path: &Path, writer: W) -> PipelineResult<()> {
    let rgb = image.to_rgb8();
    let result = if is_jpeg(path) {
        rgb.write_with_encoder(JpegEncoder::new_with_quality(writer, JPEG_QUALITY))
    } else {
        rgb.write_with_encoder(PngEncoder::new(writer))
    };
    result.map_err(|err| ErrorKind::io(&format!("failed to encode {}", path.display()), err))
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg"))
}
