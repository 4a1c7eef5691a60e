//! Icon state variants from a shared SVG template.
//!
//! A template carries a color marker. Each state (normal, hover, selected)
//! substitutes its own color and is rasterized to a fixed-width PNG under
//! `<web>/res/`. States are generated independently: one failing state never
//! prevents the others.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AssetError;
use crate::stale::{image_width, needs_rebuild};
use crate::tool::{RasterTarget, Toolchain};
use crate::transcode::{ConversionJob, TransformKind};
use crate::write::{ensure_dir, persist, temp_beside};

/// Interaction state of an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconState {
    Normal,
    Hover,
    Selected,
}

impl IconState {
    /// All states, in output order.
    pub const ALL: [Self; 3] = [Self::Normal, Self::Hover, Self::Selected];

    /// File name suffix (`<base><suffix>.png`).
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Normal => "",
            Self::Hover => "_hover",
            Self::Selected => "_sel",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Hover => "hover",
            Self::Selected => "selected",
        }
    }
}

/// Color of each icon state (any SVG color literal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconColors {
    pub normal: String,
    pub hover: String,
    pub selected: String,
}

impl IconColors {
    #[must_use]
    pub fn color(&self, state: IconState) -> &str {
        match state {
            IconState::Normal => &self.normal,
            IconState::Hover => &self.hover,
            IconState::Selected => &self.selected,
        }
    }
}

impl Default for IconColors {
    fn default() -> Self {
        Self {
            normal: "#555555".to_owned(),
            hover: "#000000".to_owned(),
            selected: "#0066cc".to_owned(),
        }
    }
}

/// A loaded icon template.
#[derive(Debug)]
pub struct IconTemplate {
    path: PathBuf,
    base: String,
    svg: String,
}

impl IconTemplate {
    /// Read the template at `path`; its file stem names the outputs.
    pub fn load(path: &Path) -> Result<Self, AssetError> {
        let svg = fs::read_to_string(path).map_err(|e| AssetError::io(path, e))?;
        let base = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            base,
            svg,
        })
    }

    /// Logical name of the icon (template file stem).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.base
    }

    /// Output path of `state` inside `res_dir`.
    #[must_use]
    pub fn variant_path(&self, res_dir: &Path, state: IconState) -> PathBuf {
        res_dir.join(format!("{}{}.png", self.base, state.suffix()))
    }

    /// Template source with every `marker` replaced by `color`.
    #[must_use]
    pub fn recolor(&self, marker: &str, color: &str) -> String {
        self.svg.replace(marker, color)
    }
}

/// Generates the three state rasterizations of icon templates.
pub struct IconGenerator<'a> {
    pub tools: &'a Toolchain,
    /// Color marker substituted in templates.
    pub marker: &'a str,
    /// Output width in pixels.
    pub size: u32,
    /// Directory for recolored temporary SVGs.
    pub scratch_dir: &'a Path,
}

impl IconGenerator<'_> {
    /// Render every state of `template` into `res_dir`.
    ///
    /// The returned array is ordered like [`IconState::ALL`]; each entry is
    /// the outcome of that state alone.
    pub fn generate(
        &self,
        template: &IconTemplate,
        colors: &IconColors,
        res_dir: &Path,
    ) -> [Result<bool, AssetError>; 3] {
        IconState::ALL.map(|state| {
            let job = ConversionJob {
                source: template.path.clone(),
                dest: template.variant_path(res_dir, state),
                target: RasterTarget::Width(self.size),
                color: Some(colors.color(state).to_owned()),
                kind: TransformKind::Rasterize,
            };
            self.render_variant(template, state, &job)
        })
    }

    /// Render one state; `Ok(false)` when the existing PNG is fresh.
    fn render_variant(
        &self,
        template: &IconTemplate,
        state: IconState,
        job: &ConversionJob,
    ) -> Result<bool, AssetError> {
        if !needs_rebuild(&job.source, &job.dest, Some(self.size)) {
            return Ok(false);
        }

        ensure_dir(self.scratch_dir)?;
        let color = job.color.as_deref().unwrap_or_default();
        let svg = tempfile::Builder::new()
            .prefix(&format!("{}{}.", template.base, state.suffix()))
            .suffix(".svg")
            .tempfile_in(self.scratch_dir)
            .map_err(|e| AssetError::io(self.scratch_dir, e))?;
        fs::write(svg.path(), template.recolor(self.marker, color))
            .map_err(|e| AssetError::io(svg.path(), e))?;

        let png = temp_beside(&job.dest)?;
        self.tools.rasterize(svg.path(), &png, job.target)?;
        self.tools.optimize(&png)?;
        if image_width(&png) != Some(self.size) {
            return Err(AssetError::MissingOutput {
                stage: "svg rasterizer",
                path: job.dest.clone(),
            });
        }
        persist(png, &job.dest)?;

        tracing::info!(icon = %template.base, state = state.as_str(), "rendered icon variant");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::consts::COLOR_MARKER;
    use crate::mock::MockRunner;
    use crate::tool::ToolSet;

    const TEMPLATE: &str =
        r#"<svg xmlns="http://www.w3.org/2000/svg"><path fill="%COLOR%" stroke="%COLOR%"/></svg>"#;

    fn setup(runner: &MockRunner) -> (TempDir, Toolchain, IconTemplate) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("search.svg");
        fs::write(&path, TEMPLATE).unwrap();
        let template = IconTemplate::load(&path).unwrap();
        let tools = Toolchain::new(Box::new(runner.clone()), ToolSet::default());
        (tmp, tools, template)
    }

    #[test]
    fn test_recolor_replaces_every_marker() {
        let runner = MockRunner::new();
        let (_tmp, _tools, template) = setup(&runner);

        assert_eq!(
            template.recolor(COLOR_MARKER, "#ff0000"),
            r##"<svg xmlns="http://www.w3.org/2000/svg"><path fill="#ff0000" stroke="#ff0000"/></svg>"##
        );
    }

    #[test]
    fn test_variant_paths() {
        let runner = MockRunner::new();
        let (_tmp, _tools, template) = setup(&runner);
        let res = Path::new("/web/res");

        assert_eq!(template.name(), "search");
        assert_eq!(
            IconState::ALL.map(|s| template.variant_path(res, s)),
            [
                PathBuf::from("/web/res/search.png"),
                PathBuf::from("/web/res/search_hover.png"),
                PathBuf::from("/web/res/search_sel.png"),
            ]
        );
    }

    #[test]
    fn test_generates_three_variants_at_size() {
        let runner = MockRunner::new();
        let (tmp, tools, template) = setup(&runner);
        let res = tmp.path().join("web/res");
        let scratch = tmp.path().join("scratch");
        let generator = IconGenerator {
            tools: &tools,
            marker: COLOR_MARKER,
            size: 32,
            scratch_dir: &scratch,
        };

        let results = generator.generate(&template, &IconColors::default(), &res);

        assert!(results.iter().all(|r| matches!(r, Ok(true))));
        for state in IconState::ALL {
            assert_eq!(image_width(&template.variant_path(&res, state)), Some(32));
        }
        assert_eq!(runner.calls_to("rsvg-convert"), 3);
        // Recolored temporaries are cleaned up
        assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[test]
    fn test_fresh_variants_are_skipped() {
        let runner = MockRunner::new();
        let (tmp, tools, template) = setup(&runner);
        let res = tmp.path().join("res");
        let scratch = tmp.path().join("scratch");
        let generator = IconGenerator {
            tools: &tools,
            marker: COLOR_MARKER,
            size: 16,
            scratch_dir: &scratch,
        };

        let _ = generator.generate(&template, &IconColors::default(), &res);
        runner.reset_calls();
        let results = generator.generate(&template, &IconColors::default(), &res);

        assert!(results.iter().all(|r| matches!(r, Ok(false))));
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn test_hover_failure_is_isolated() {
        let runner = MockRunner::new().fail_on("_hover");
        let (tmp, tools, template) = setup(&runner);
        let res = tmp.path().join("res");
        let scratch = tmp.path().join("scratch");
        let generator = IconGenerator {
            tools: &tools,
            marker: COLOR_MARKER,
            size: 24,
            scratch_dir: &scratch,
        };

        let [normal, hover, selected] = generator.generate(&template, &IconColors::default(), &res);

        assert!(matches!(normal, Ok(true)));
        assert!(hover.is_err());
        assert!(matches!(selected, Ok(true)));
        assert!(res.join("search.png").exists());
        assert!(!res.join("search_hover.png").exists());
        assert!(res.join("search_sel.png").exists());
    }
}
