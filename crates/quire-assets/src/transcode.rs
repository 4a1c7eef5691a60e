//! Per-format transcoders for page images.
//!
//! | Source | Transform | Artifact |
//! |--------|-----------|----------|
//! | `svg` | rasterize at the requested width, optimize | `.png` |
//! | `png` | downscale if wider than requested (else verbatim), optimize | `.png` |
//! | `jpg`/`jpeg` | downscale if wider than requested (else verbatim) | `.jpg` |
//! | `gif` | verbatim copy | `.gif` |
//!
//! Bitmaps are never upscaled: a maximum width above the native width clamps
//! to the native width.

use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use image::imageops::FilterType;

use crate::consts::DEFAULT_GIF_WIDTH;
use crate::error::AssetError;
use crate::stale::{image_width, needs_rebuild};
use crate::tool::{RasterTarget, Toolchain};
use crate::write::{copy_atomic, persist, temp_beside};

/// Source format, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Svg,
    Png,
    Jpg,
    Gif,
}

impl SourceFormat {
    /// Detect the format of `path` (case-insensitive extension).
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "svg" => Some(Self::Svg),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpg),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Extension of the artifact produced from this format.
    #[must_use]
    pub fn output_extension(self) -> &'static str {
        match self {
            Self::Svg | Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Gif => "gif",
        }
    }

    /// Transform applied to sources of this format.
    #[must_use]
    pub fn transform(self) -> TransformKind {
        match self {
            Self::Svg => TransformKind::Rasterize,
            Self::Png | Self::Jpg => TransformKind::Resize,
            Self::Gif => TransformKind::Copy,
        }
    }
}

/// What a conversion does to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    /// Vector to PNG through the external rasterizer.
    Rasterize,
    /// Decode, downscale, re-encode.
    Resize,
    /// Verbatim byte copy.
    Copy,
}

/// One source → artifact conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub dest: PathBuf,
    /// Requested pixel width (clamped to native for bitmaps) or DPI.
    pub target: RasterTarget,
    /// Replacement color for icon templates.
    pub color: Option<String>,
    pub kind: TransformKind,
}

impl ConversionJob {
    /// Job transcoding `source` into `dest` at most `max_width` pixels wide.
    pub fn for_image(source: &Path, dest: &Path, max_width: u32) -> Result<Self, AssetError> {
        let format = SourceFormat::from_path(source)
            .ok_or_else(|| AssetError::UnsupportedFormat(source.to_path_buf()))?;
        Ok(Self {
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
            target: RasterTarget::Width(max_width),
            color: None,
            kind: format.transform(),
        })
    }
}

/// Result of a successful transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcoded {
    /// Pixel width of the artifact.
    pub width: u32,
    /// Whether the artifact was (re)generated rather than reused.
    pub rebuilt: bool,
}

/// Transcode `source` into `dest`, at most `max_width` pixels wide.
///
/// Reuses `dest` when it is fresh. On error `dest` is left untouched.
pub fn transcode(
    tools: &Toolchain,
    source: &Path,
    dest: &Path,
    max_width: u32,
) -> Result<Transcoded, AssetError> {
    let job = ConversionJob::for_image(source, dest, max_width)?;
    fs::metadata(source).map_err(|e| AssetError::io(source, e))?;

    match job.kind {
        TransformKind::Rasterize => rasterize_svg(tools, &job, max_width),
        TransformKind::Resize => resize_bitmap(tools, &job, max_width),
        TransformKind::Copy => copy_verbatim(&job),
    }
}

fn rasterize_svg(tools: &Toolchain, job: &ConversionJob, width: u32) -> Result<Transcoded, AssetError> {
    if !needs_rebuild(&job.source, &job.dest, Some(width)) {
        tracing::debug!(dest = %job.dest.display(), "svg raster is fresh");
        return Ok(Transcoded {
            width,
            rebuilt: false,
        });
    }

    let temp = temp_beside(&job.dest)?;
    tools.rasterize(&job.source, &temp, job.target)?;
    tools.optimize(&temp)?;
    let actual = image_width(&temp).ok_or_else(|| AssetError::MissingOutput {
        stage: "svg rasterizer",
        path: job.dest.clone(),
    })?;
    persist(temp, &job.dest)?;

    tracing::info!(source = %job.source.display(), width = actual, "rasterized svg");
    Ok(Transcoded {
        width: actual,
        rebuilt: true,
    })
}

fn resize_bitmap(
    tools: &Toolchain,
    job: &ConversionJob,
    max_width: u32,
) -> Result<Transcoded, AssetError> {
    let is_png = SourceFormat::from_path(&job.source) == Some(SourceFormat::Png);
    let (native_width, native_height) = read_dimensions(&job.source)?;
    let width = native_width.min(max_width);

    if !needs_rebuild(&job.source, &job.dest, Some(width)) {
        tracing::debug!(dest = %job.dest.display(), "bitmap is fresh");
        return Ok(Transcoded {
            width,
            rebuilt: false,
        });
    }

    // Decode fully before writing anything, even for a verbatim copy
    let decoded = decode(&job.source)?;
    let temp = temp_beside(&job.dest)?;
    if width == native_width {
        fs::copy(&job.source, &temp).map_err(|e| AssetError::io(&job.source, e))?;
    } else {
        let height = scaled_height(native_width, native_height, width);
        let resized = decoded.resize_exact(width, height, FilterType::Lanczos3);
        encode(&resized, is_png, &temp)?;
    }
    if is_png {
        tools.optimize(&temp)?;
    }
    persist(temp, &job.dest)?;

    tracing::info!(
        source = %job.source.display(),
        native_width,
        width,
        "transcoded bitmap"
    );
    Ok(Transcoded {
        width,
        rebuilt: true,
    })
}

fn copy_verbatim(job: &ConversionJob) -> Result<Transcoded, AssetError> {
    // Width counts only when the first frame decodes
    let width = decode(&job.source).map_or(DEFAULT_GIF_WIDTH, |image| image.width());
    let rebuilt = needs_rebuild(&job.source, &job.dest, None);
    if rebuilt {
        copy_atomic(&job.source, &job.dest)?;
        tracing::info!(source = %job.source.display(), "copied image");
    }
    Ok(Transcoded { width, rebuilt })
}

/// Height preserving the aspect ratio at `width`, at least one pixel.
fn scaled_height(native_width: u32, native_height: u32, width: u32) -> u32 {
    let scaled = (u64::from(native_height) * u64::from(width) + u64::from(native_width) / 2)
        / u64::from(native_width.max(1));
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

/// Header dimensions of a bitmap source, as a decode error when unreadable.
fn read_dimensions(path: &Path) -> Result<(u32, u32), AssetError> {
    image::ImageReader::open(path)
        .and_then(image::ImageReader::with_guessed_format)
        .map_err(|e| AssetError::io(path, e))?
        .into_dimensions()
        .map_err(|source| AssetError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Decode the first frame of `path`, detecting the format from its content.
fn decode(path: &Path) -> Result<DynamicImage, AssetError> {
    image::ImageReader::open(path)
        .and_then(image::ImageReader::with_guessed_format)
        .map_err(|e| AssetError::io(path, e))?
        .decode()
        .map_err(|source| AssetError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

fn encode(image: &DynamicImage, png: bool, path: &Path) -> Result<(), AssetError> {
    let result = if png {
        image.save_with_format(path, image::ImageFormat::Png)
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8()).save_with_format(path, image::ImageFormat::Jpeg)
    };
    result.map_err(|source| AssetError::Encode {
        path: path.to_path_buf(),
        source,
    })
}
