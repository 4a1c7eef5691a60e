//! Session-level entry point for derived assets.
//!
//! [`AssetPipeline`] owns the toolchain and the session's
//! [`StatusCollector`]. Its operations never fail: every error is recorded as
//! exactly one message qualified with the source it concerns, and callers get
//! a placeholder (or a `false` flag) so page generation can continue.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::consts::{
    COLOR_MARKER, DEFAULT_FORMULA_DPI, DEFAULT_ICON_SIZE, PLACEHOLDER_IMAGE, PLACEHOLDER_WIDTH,
};
use crate::context::SiteContext;
use crate::error::AssetError;
use crate::formula::FormulaRenderer;
use crate::icons::{IconColors, IconGenerator, IconState, IconTemplate};
use crate::resources::sync_resources;
use crate::status::StatusCollector;
use crate::tool::Toolchain;
use crate::transcode::{SourceFormat, transcode};

/// Reference to an image usable in generated HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// File name inside the context's image (or resource) directory.
    pub name: String,
    /// Pixel width.
    pub width: u32,
}

impl ImageRef {
    /// Stand-in for an artifact that could not be produced.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            name: PLACEHOLDER_IMAGE.to_owned(),
            width: PLACEHOLDER_WIDTH,
        }
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.name == PLACEHOLDER_IMAGE
    }
}

/// Tunables of the asset pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Icon rasterization width in pixels.
    pub icon_size: u32,
    /// Color marker in icon templates.
    pub icon_marker: String,
    /// Icon state colors.
    pub icon_colors: IconColors,
    /// Formula rasterization DPI.
    pub formula_dpi: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            icon_size: DEFAULT_ICON_SIZE,
            icon_marker: COLOR_MARKER.to_owned(),
            icon_colors: IconColors::default(),
            formula_dpi: DEFAULT_FORMULA_DPI,
        }
    }
}

/// Derived-asset pipeline for one generation session.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use quire_assets::{AssetPipeline, PipelineSettings, SiteContext, Toolchain};
///
/// let mut pipeline = AssetPipeline::new(Toolchain::system(), PipelineSettings::default());
/// let ctx = SiteContext::for_language(Path::new("web"), "en", ".quire/scratch").with_folder("intro");
///
/// let image = pipeline.request_image(&ctx, Path::new("site/img/intro/diagram.svg"), 640);
/// println!("<img src=\"img/intro/{}\" width=\"{}\">", image.name, image.width);
///
/// for message in pipeline.status_mut().take() {
///     eprintln!("{message}");
/// }
/// ```
pub struct AssetPipeline {
    tools: Toolchain,
    settings: PipelineSettings,
    status: StatusCollector,
    /// Image artifact → source that produced it this session.
    claimed: HashMap<PathBuf, PathBuf>,
}

impl AssetPipeline {
    #[must_use]
    pub fn new(tools: Toolchain, settings: PipelineSettings) -> Self {
        Self {
            tools,
            settings,
            status: StatusCollector::new(),
            claimed: HashMap::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Errors collected so far.
    #[must_use]
    pub fn status(&self) -> &StatusCollector {
        &self.status
    }

    /// Mutable access for clearing or draining at checkpoints.
    pub fn status_mut(&mut self) -> &mut StatusCollector {
        &mut self.status
    }

    /// Transcode `source` into `dest`, at most `max_width` pixels wide.
    ///
    /// Returns the artifact width and whether it is usable. On failure the
    /// width is 0 and one message naming `source` is recorded.
    pub fn transcode(&mut self, source: &Path, dest: &Path, max_width: u32) -> (u32, bool) {
        match transcode(&self.tools, source, dest, max_width) {
            Ok(done) => (done.width, true),
            Err(e) => {
                self.status.report(&source.display().to_string(), &e);
                (0, false)
            }
        }
    }

    /// Image `source` for the current page, as `<img>/<folder>/<stem>.<ext>`.
    ///
    /// The artifact keeps the source's logical name (file stem); the
    /// extension follows the format (`svg` sources become `png`). Sources
    /// sharing a stem (`chart.svg`, `chart.png`) map to the same artifact: the
    /// first one requested in the session owns it, later ones get the
    /// placeholder and one content error.
    pub fn request_image(&mut self, ctx: &SiteContext, source: &Path, max_width: u32) -> ImageRef {
        let Some(name) = artifact_name(source) else {
            // Unsupported extension: let transcode report it against the source.
            let dest = ctx.img_dir().join(source.file_name().unwrap_or_default());
            self.transcode(source, &dest, max_width);
            return ImageRef::placeholder();
        };

        let dest = ctx.img_dir().join(&name);
        let owner = self
            .claimed
            .entry(dest.clone())
            .or_insert_with(|| source.to_path_buf());
        if owner.as_path() != source {
            let error = AssetError::NameCollision {
                dest,
                owner: owner.clone(),
            };
            self.status.report(&source.display().to_string(), &error);
            return ImageRef::placeholder();
        }

        match self.transcode(source, &dest, max_width) {
            (width, true) => ImageRef { name, width },
            _ => ImageRef::placeholder(),
        }
    }

    /// Render the normal/hover/selected variants of an icon template into
    /// `<web>/res/`.
    ///
    /// Every state is attempted; the result is ordered like
    /// [`IconState::ALL`]. Each failed state records one message naming the
    /// icon.
    pub fn make_icon_variants(
        &mut self,
        ctx: &SiteContext,
        template: &Path,
        colors: &IconColors,
        size: u32,
    ) -> [bool; 3] {
        let template = match IconTemplate::load(template) {
            Ok(t) => t,
            Err(e) => {
                self.status
                    .report(&format!("icon {}", template.display()), &e);
                return [false; 3];
            }
        };

        let generator = IconGenerator {
            tools: &self.tools,
            marker: &self.settings.icon_marker,
            size,
            scratch_dir: &ctx.scratch_dir,
        };
        let results = generator.generate(&template, colors, &ctx.res_dir());

        let mut ok = [false; 3];
        for ((state, result), slot) in IconState::ALL.into_iter().zip(results).zip(&mut ok) {
            match result {
                Ok(_) => *slot = true,
                Err(e) => self.status.report(
                    &format!("icon {} ({})", template.name(), state.as_str()),
                    &e,
                ),
            }
        }
        ok
    }

    /// [`make_icon_variants`](Self::make_icon_variants) with the configured
    /// colors and size.
    pub fn make_configured_icon(&mut self, ctx: &SiteContext, template: &Path) -> [bool; 3] {
        let colors = self.settings.icon_colors.clone();
        let size = self.settings.icon_size;
        self.make_icon_variants(ctx, template, &colors, size)
    }

    /// Render a LaTeX fragment to `<img>/<folder>/<basename>.png`.
    ///
    /// Returns `None` (after recording one message naming `basename`) if any
    /// stage fails; use [`formula_image`](Self::formula_image) to get a
    /// placeholder instead.
    pub fn render_formula(
        &mut self,
        ctx: &SiteContext,
        tex: &str,
        basename: &str,
        autocrop: bool,
    ) -> Option<ImageRef> {
        let renderer = FormulaRenderer {
            tools: &self.tools,
            dpi: self.settings.formula_dpi,
            scratch_dir: &ctx.scratch_dir,
        };
        match renderer.render(tex, &ctx.img_dir(), basename, autocrop) {
            Ok(rendered) => Some(ImageRef {
                name: rendered.name,
                width: rendered.width,
            }),
            Err(e) => {
                self.status.report(&format!("formula {basename}"), &e);
                None
            }
        }
    }

    /// Like [`render_formula`](Self::render_formula), substituting the
    /// placeholder on failure.
    pub fn formula_image(
        &mut self,
        ctx: &SiteContext,
        tex: &str,
        basename: &str,
        autocrop: bool,
    ) -> ImageRef {
        self.render_formula(ctx, tex, basename, autocrop)
            .unwrap_or_else(ImageRef::placeholder)
    }

    /// Copy stale resources from `resource_dir` into `<web>/res/`.
    ///
    /// Returns the number of files copied. Records one message per failed
    /// file, or one for an unreadable `resource_dir`.
    pub fn sync_resources(&mut self, ctx: &SiteContext, resource_dir: &Path) -> usize {
        match sync_resources(resource_dir, &ctx.res_dir()) {
            Ok(report) => {
                for (rel, e) in &report.failures {
                    self.status
                        .report(&format!("resource {}", rel.display()), e);
                }
                tracing::debug!(
                    copied = report.copied,
                    unchanged = report.unchanged,
                    "resources synced"
                );
                report.copied
            }
            Err(e) => {
                self.status
                    .report(&format!("resources {}", resource_dir.display()), &e);
                0
            }
        }
    }
}

/// `<stem>.<output ext>` for a supported source.
fn artifact_name(source: &Path) -> Option<String> {
    let format = SourceFormat::from_path(source)?;
    let stem = source.file_stem()?.to_string_lossy();
    Some(format!("{stem}.{}", format.output_extension()))
}

/// Path of the artifact [`AssetPipeline::request_image`] produces for `source`.
#[must_use]
pub fn image_dest(ctx: &SiteContext, source: &Path) -> Option<PathBuf> {
    artifact_name(source).map(|name| ctx.img_dir().join(name))
}
