//! Explicit per-call generation context.

use std::path::{Path, PathBuf};

/// Where derived assets of the current page go.
///
/// Passed to every pipeline operation instead of living on a long-lived site
/// object, so tests and separate languages never share hidden state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContext {
    /// Per-language web root (`<output>/<lang>`).
    pub web_dir: PathBuf,
    /// Image folder of the current page (`img/<folder>/`).
    pub folder: String,
    /// Scratch directory reused by formula rendering and icon recoloring.
    pub scratch_dir: PathBuf,
}

impl SiteContext {
    #[must_use]
    pub fn new(web_dir: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            web_dir: web_dir.into(),
            folder: String::new(),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Context for the web root of `language` below `output_dir`.
    #[must_use]
    pub fn for_language(output_dir: &Path, language: &str, scratch_dir: impl Into<PathBuf>) -> Self {
        Self::new(output_dir.join(language), scratch_dir)
    }

    /// Same context with a different image folder.
    #[must_use]
    pub fn with_folder(&self, folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            ..self.clone()
        }
    }

    /// `<web>/res`: synced resources and icon variants.
    #[must_use]
    pub fn res_dir(&self) -> PathBuf {
        self.web_dir.join("res")
    }

    /// `<web>/img/<folder>`: transcoded bitmaps and formulas.
    #[must_use]
    pub fn img_dir(&self) -> PathBuf {
        let img = self.web_dir.join("img");
        if self.folder.is_empty() {
            img
        } else {
            img.join(&self.folder)
        }
    }
}
