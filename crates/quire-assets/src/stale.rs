//! Staleness checks for derived artifacts.
//!
//! An artifact is rebuilt when it is missing, older than its source, or (when
//! a width is requested) its decoded pixel width differs from the request.
//! The width check only reads the image header, and guards against truncated
//! or foreign files that happen to carry a newer timestamp.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use image::ImageReader;

/// Freshness of a derived artifact relative to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Up to date; reuse it.
    Fresh,
    /// Exists but is older than the source or has the wrong width.
    Stale,
    /// Does not exist.
    Missing,
}

/// Classify `dest` against `source`.
///
/// An unreadable source timestamp is treated as stale so the rebuild attempt
/// surfaces the real error. An undecodable destination is stale whenever a
/// width is requested.
#[must_use]
pub fn freshness(source: &Path, dest: &Path, requested_width: Option<u32>) -> Freshness {
    let Some(dest_mtime) = modified(dest) else {
        return Freshness::Missing;
    };
    let Some(source_mtime) = modified(source) else {
        return Freshness::Stale;
    };
    if dest_mtime < source_mtime {
        return Freshness::Stale;
    }

    match requested_width {
        Some(width) if image_width(dest) != Some(width) => Freshness::Stale,
        _ => Freshness::Fresh,
    }
}

/// Whether `dest` must be regenerated from `source`.
#[must_use]
pub fn needs_rebuild(source: &Path, dest: &Path, requested_width: Option<u32>) -> bool {
    freshness(source, dest, requested_width) != Freshness::Fresh
}

/// Pixel width of the image at `path`, read from its header.
///
/// The format is detected from content, not from the extension.
#[must_use]
pub fn image_width(path: &Path) -> Option<u32> {
    image_dimensions(path).map(|(width, _)| width)
}

/// Pixel dimensions of the image at `path`, read from its header.
#[must_use]
pub fn image_dimensions(path: &Path) -> Option<(u32, u32)> {
    ImageReader::open(path)
        .ok()?
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
