//! Text cache keys stored beside rendered artifacts.
//!
//! A sidecar holds the exact input last used to render the artifact next to
//! it (`formula.png` → `formula.txt`). A lookup hits only when the stored
//! bytes equal the requested input; timestamps play no part.

use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::SIDECAR_EXTENSION;
use crate::error::AssetError;
use crate::write::write_atomic;

/// Cache key file belonging to one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sidecar {
    path: PathBuf,
}

impl Sidecar {
    /// Sidecar of `artifact` (same stem, `.txt` extension).
    #[must_use]
    pub fn for_artifact(artifact: &Path) -> Self {
        Self {
            path: artifact.with_extension(SIDECAR_EXTENSION),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored key, or `None` if there is no readable sidecar.
    #[must_use]
    pub fn load(&self) -> Option<Vec<u8>> {
        fs::read(&self.path).ok()
    }

    /// Whether the stored key is byte-for-byte equal to `key`.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.load().is_some_and(|stored| stored == key.as_bytes())
    }

    /// Replace the stored key with `key`, verbatim.
    pub fn store(&self, key: &str) -> Result<(), AssetError> {
        write_atomic(&self.path, key.as_bytes())
    }
}
