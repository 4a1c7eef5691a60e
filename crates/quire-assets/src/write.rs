//! All-or-nothing artifact writes.
//!
//! Artifacts are produced in a temporary file inside the destination
//! directory and renamed over the destination only once complete, so a
//! failed conversion never leaves a partial file behind.

use std::fs;
use std::path::Path;

use tempfile::TempPath;

use crate::error::AssetError;

/// Create `dir` and its parents.
pub(crate) fn ensure_dir(dir: &Path) -> Result<(), AssetError> {
    fs::create_dir_all(dir).map_err(|e| AssetError::io(dir, e))
}

/// Reserve a temporary path beside `dest` that keeps `dest`'s extension.
///
/// The file is removed when the returned [`TempPath`] is dropped unless it is
/// passed to [`persist`].
pub(crate) fn temp_beside(dest: &Path) -> Result<TempPath, AssetError> {
    let dir = dest.parent().unwrap_or(Path::new("."));
    ensure_dir(dir)?;

    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = dest
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(&suffix)
        .tempfile_in(dir)
        .map(tempfile::NamedTempFile::into_temp_path)
        .map_err(|e| AssetError::io(dir, e))
}

/// Atomically move a completed temporary file over `dest`.
pub(crate) fn persist(temp: TempPath, dest: &Path) -> Result<(), AssetError> {
    temp.persist(dest).map_err(|e| AssetError::io(dest, e.error))
}

/// Copy `source` to `dest` without ever exposing a partial `dest`.
pub(crate) fn copy_atomic(source: &Path, dest: &Path) -> Result<(), AssetError> {
    let temp = temp_beside(dest)?;
    fs::copy(source, &temp).map_err(|e| AssetError::io(source, e))?;
    persist(temp, dest)
}

/// Write `contents` to `dest` without ever exposing a partial `dest`.
pub(crate) fn write_atomic(dest: &Path, contents: &[u8]) -> Result<(), AssetError> {
    let temp = temp_beside(dest)?;
    fs::write(&temp, contents).map_err(|e| AssetError::io(dest, e))?;
    persist(temp, dest)
}
