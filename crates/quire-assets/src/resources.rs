//! Static resource synchronization (fonts, flags, banners).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::AssetError;
use crate::stale::needs_rebuild;
use crate::write::copy_atomic;

/// Outcome of one synchronization pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Files copied because they were missing or stale.
    pub copied: usize,
    /// Files already up to date.
    pub unchanged: usize,
    /// Per-resource failures, keyed by path relative to the resource root.
    pub failures: Vec<(PathBuf, AssetError)>,
}

/// Copy every file below `source_dir` to the same relative path below
/// `dest_dir` when the destination is missing or older than the source.
///
/// Hidden files and directories are skipped. Only an unreadable
/// `source_dir` fails the whole pass; unreadable entries, subdirectories and
/// individual copy errors are collected in the report.
pub fn sync_resources(source_dir: &Path, dest_dir: &Path) -> Result<SyncReport, AssetError> {
    let mut report = SyncReport::default();
    let mut files = Vec::new();
    collect_files(source_dir, Path::new(""), &mut files, &mut report.failures)?;

    for rel in files {
        let source = source_dir.join(&rel);
        let dest = dest_dir.join(&rel);
        if !needs_rebuild(&source, &dest, None) {
            report.unchanged += 1;
            continue;
        }
        match copy_atomic(&source, &dest) {
            Ok(()) => {
                tracing::debug!(resource = %rel.display(), "synced resource");
                report.copied += 1;
            }
            Err(e) => report.failures.push((rel, e)),
        }
    }
    Ok(report)
}

/// Collect regular files below `dir`, sorted, as paths relative to the root.
///
/// Fails only when `dir` itself cannot be listed.
fn collect_files(
    dir: &Path,
    rel: &Path,
    files: &mut Vec<PathBuf>,
    failures: &mut Vec<(PathBuf, AssetError)>,
) -> Result<(), AssetError> {
    let entries = fs::read_dir(dir).map_err(|e| AssetError::io(dir, e))?;

    let mut entries: Vec<_> = listed(dir, rel, entries, failures)
        .into_iter()
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .collect();
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        let rel_path = rel.join(entry.file_name());
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                failures.push((rel_path, AssetError::io(entry.path(), e)));
                continue;
            }
        };
        if file_type.is_dir() {
            if let Err(e) = collect_files(&entry.path(), &rel_path, files, failures) {
                failures.push((rel_path, e));
            }
        } else {
            files.push(rel_path);
        }
    }
    Ok(())
}

/// Readable entries of a directory listing; each unreadable one becomes a
/// failure keyed by the directory's relative path.
fn listed<T>(
    dir: &Path,
    rel: &Path,
    entries: impl IntoIterator<Item = io::Result<T>>,
    failures: &mut Vec<(PathBuf, AssetError)>,
) -> Vec<T> {
    let mut ok = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => ok.push(entry),
            Err(e) => failures.push((rel.to_path_buf(), AssetError::io(dir, e))),
        }
    }
    ok
}
