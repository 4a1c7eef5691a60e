//! LaTeX formula rendering to PNG.
//!
//! A fragment goes through a gated pipeline, each stage aborting the render
//! on failure:
//!
//! ```text
//! sidecar check → formula.tex → pdflatex → formula.pdf → pdf2svg → formula.svg
//!               → rasterize at DPI → [autocrop] → optimize → commit PNG + sidecar
//! ```
//!
//! The rendered PNG is reused when the sidecar beside it holds exactly the
//! requested fragment. Timestamps are ignored.
//!
//! All intermediates live in one scratch directory that is reused between
//! calls, so renders must not run concurrently on the same scratch directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use image::imageops;

use crate::consts::FORMULA_STEM;
use crate::error::AssetError;
use crate::sidecar::Sidecar;
use crate::stale::image_width;
use crate::tool::{RasterTarget, Toolchain};
use crate::write::{copy_atomic, ensure_dir};

/// A rendered (or reused) formula image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFormula {
    /// Artifact file name (`<basename>.png`).
    pub name: String,
    /// Pixel width of the artifact.
    pub width: u32,
    /// Whether the toolchain ran (false on a sidecar hit).
    pub rendered: bool,
}

/// Renders formula fragments into an image directory.
pub struct FormulaRenderer<'a> {
    pub tools: &'a Toolchain,
    /// Rasterization resolution.
    pub dpi: u32,
    /// Reused directory for `.tex`/`.pdf`/`.svg`/`.png` intermediates.
    pub scratch_dir: &'a Path,
}

impl FormulaRenderer<'_> {
    /// Render `tex` to `<img_dir>/<basename>.png`, reusing it when the
    /// sidecar matches.
    pub fn render(
        &self,
        tex: &str,
        img_dir: &Path,
        basename: &str,
        autocrop: bool,
    ) -> Result<RenderedFormula, AssetError> {
        let name = format!("{basename}.png");
        let dest = img_dir.join(&name);
        let sidecar = Sidecar::for_artifact(&dest);

        if sidecar.matches(tex)
            && let Some(width) = image_width(&dest)
        {
            tracing::debug!(formula = basename, "formula cache hit");
            return Ok(RenderedFormula {
                name,
                width,
                rendered: false,
            });
        }

        let png = self.render_to_scratch(tex, autocrop)?;
        let width = image_width(&png).ok_or_else(|| AssetError::MissingOutput {
            stage: "svg rasterizer",
            path: png.clone(),
        })?;

        copy_atomic(&png, &dest)?;
        sidecar.store(tex)?;

        tracing::info!(formula = basename, width, "rendered formula");
        Ok(RenderedFormula {
            name,
            width,
            rendered: true,
        })
    }

    /// Run the toolchain and return the finished PNG in the scratch directory.
    fn render_to_scratch(&self, tex: &str, autocrop: bool) -> Result<PathBuf, AssetError> {
        let scratch = self.scratch_dir;
        ensure_dir(scratch)?;

        let tex_path = self.scratch_file("tex");
        let pdf_path = self.scratch_file("pdf");
        let svg_path = self.scratch_file("svg");
        let png_path = self.scratch_file("png");
        for stale in [&pdf_path, &svg_path, &png_path] {
            remove_if_exists(stale)?;
        }

        fs::write(&tex_path, standalone_document(tex)).map_err(|e| AssetError::io(&tex_path, e))?;

        self.tools.compile_latex(&tex_path, scratch)?;
        require_output("LaTeX", &pdf_path)?;

        self.tools.pdf_to_svg(&pdf_path, &svg_path)?;
        require_output("pdf2svg", &svg_path)?;

        self.tools
            .rasterize(&svg_path, &png_path, RasterTarget::Dpi(self.dpi))?;
        require_output("svg rasterizer", &png_path)?;

        if autocrop {
            crop_vertical(&png_path)?;
        }
        self.tools.optimize(&png_path)?;

        Ok(png_path)
    }

    fn scratch_file(&self, extension: &str) -> PathBuf {
        self.scratch_dir
            .join(FORMULA_STEM)
            .with_extension(extension)
    }
}

/// Wrap a fragment in a standalone document: variable-width box, no margins.
#[must_use]
pub fn standalone_document(fragment: &str) -> String {
    format!(
        "\\documentclass[varwidth=true,border=0pt]{{standalone}}\n\
         \\usepackage{{amsmath}}\n\
         \\usepackage{{amssymb}}\n\
         \\pagestyle{{empty}}\n\
         \\begin{{document}}\n\
         {fragment}\n\
         \\end{{document}}\n"
    )
}

/// Trim fully transparent rows above and below the content, keeping the full
/// width.
///
/// Returns `Ok(true)` if the image was rewritten. Images without any opaque
/// pixel, or without transparent margins, are left untouched.
pub fn crop_vertical(path: &Path) -> Result<bool, AssetError> {
    let image = image::open(path)
        .map_err(|source| AssetError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();
    let (width, height) = image.dimensions();

    let opaque_row = |y: u32| (0..width).any(|x| image.get_pixel(x, y)[3] != 0);
    let Some(top) = (0..height).find(|&y| opaque_row(y)) else {
        return Ok(false);
    };
    let bottom = (top..height).rev().find(|&y| opaque_row(y)).unwrap_or(top);
    if top == 0 && bottom + 1 == height {
        return Ok(false);
    }

    imageops::crop_imm(&image, 0, top, width, bottom - top + 1)
        .to_image()
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| AssetError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(true)
}

fn require_output(stage: &'static str, path: &Path) -> Result<(), AssetError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(AssetError::MissingOutput {
            stage,
            path: path.to_path_buf(),
        })
    }
}

fn remove_if_exists(path: &Path) -> Result<(), AssetError> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(AssetError::io(path, e)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::error::ErrorKind;
    use crate::mock::MockRunner;
    use crate::stale::image_dimensions;
    use crate::tool::ToolSet;

    const EULER: &str = "$e^{i\\pi} + 1 = 0$";

    struct Fixture {
        tmp: TempDir,
        tools: Toolchain,
        runner: MockRunner,
    }

    impl Fixture {
        fn new(runner: MockRunner) -> Self {
            Self {
                tmp: TempDir::new().unwrap(),
                tools: Toolchain::new(Box::new(runner.clone()), ToolSet::default()),
                runner,
            }
        }

        fn scratch(&self) -> PathBuf {
            self.tmp.path().join("scratch")
        }

        fn img_dir(&self) -> PathBuf {
            self.tmp.path().join("web/img/math")
        }

        fn render(&self, tex: &str, autocrop: bool) -> Result<RenderedFormula, AssetError> {
            let scratch = self.scratch();
            let renderer = FormulaRenderer {
                tools: &self.tools,
                dpi: 300,
                scratch_dir: &scratch,
            };
            renderer.render(tex, &self.img_dir(), "euler", autocrop)
        }
    }

    #[test]
    fn test_standalone_document_wraps_fragment() {
        let doc = standalone_document("$x^2$");

        assert!(doc.starts_with("\\documentclass[varwidth=true,border=0pt]{standalone}\n"));
        assert!(doc.contains("\\begin{document}\n$x^2$\n\\end{document}\n"));
    }

    #[test]
    fn test_render_writes_png_and_sidecar() {
        let fx = Fixture::new(MockRunner::new());

        let result = fx.render(EULER, false).unwrap();

        assert_eq!(
            result,
            RenderedFormula {
                name: "euler.png".to_owned(),
                width: 300,
                rendered: true,
            }
        );
        assert_eq!(
            fs::read_to_string(fx.img_dir().join("euler.txt")).unwrap(),
            EULER
        );
        assert_eq!(fx.runner.calls_to("pdflatex"), 1);
        assert_eq!(fx.runner.calls_to("pdf2svg"), 1);
        assert_eq!(fx.runner.calls_to("rsvg-convert"), 1);
    }

    #[test]
    fn test_identical_fragment_skips_toolchain_despite_mtime() {
        let fx = Fixture::new(MockRunner::new());
        fx.render(EULER, true).unwrap();
        fx.runner.reset_calls();

        let png = fx.img_dir().join("euler.png");
        File::options()
            .write(true)
            .open(&png)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(3600))
            .unwrap();

        let result = fx.render(EULER, true).unwrap();

        assert!(!result.rendered);
        assert_eq!(result.width, 300);
        assert_eq!(fx.runner.call_count(), 0);
    }

    #[test]
    fn test_changed_character_rerenders() {
        let fx = Fixture::new(MockRunner::new());
        fx.render(EULER, false).unwrap();
        fx.runner.reset_calls();

        let changed = "$e^{i\\pi} + 2 = 0$";
        let result = fx.render(changed, false).unwrap();

        assert!(result.rendered);
        assert_eq!(fx.runner.calls_to("pdflatex"), 1);
        assert_eq!(
            fs::read_to_string(fx.img_dir().join("euler.txt")).unwrap(),
            changed
        );
    }

    #[test]
    fn test_missing_png_rerenders_even_with_sidecar() {
        let fx = Fixture::new(MockRunner::new());
        fx.render(EULER, false).unwrap();
        fs::remove_file(fx.img_dir().join("euler.png")).unwrap();
        fx.runner.reset_calls();

        let result = fx.render(EULER, false).unwrap();

        assert!(result.rendered);
        assert_eq!(fx.runner.calls_to("pdflatex"), 1);
    }

    #[test]
    fn test_autocrop_trims_rows_only() {
        let fx = Fixture::new(MockRunner::new());

        fx.render(EULER, true).unwrap();

        // Mock raster at 300 DPI is 300x150 with 37 transparent rows on each side
        assert_eq!(
            image_dimensions(&fx.img_dir().join("euler.png")),
            Some((300, 76))
        );
    }

    #[test]
    fn test_latex_failure_leaves_no_artifact() {
        let fx = Fixture::new(MockRunner::new().fail_on("formula.tex"));

        let err = fx.render(EULER, false).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Tool);
        assert!(!fx.img_dir().join("euler.png").exists());
        assert!(!fx.img_dir().join("euler.txt").exists());
        assert_eq!(fx.runner.calls_to("pdf2svg"), 0);
    }

    #[test]
    fn test_failed_rerender_keeps_old_sidecar() {
        let fx = Fixture::new(MockRunner::new().fail_on("formula.pdf"));
        let img_dir = fx.img_dir();
        fs::create_dir_all(&img_dir).unwrap();
        RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]))
            .save(img_dir.join("euler.png"))
            .unwrap();
        fs::write(img_dir.join("euler.txt"), "$old$").unwrap();

        let err = fx.render(EULER, false).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Tool);
        assert_eq!(fs::read_to_string(img_dir.join("euler.txt")).unwrap(), "$old$");
        assert_eq!(image_dimensions(&img_dir.join("euler.png")), Some((10, 10)));
    }

    #[test]
    fn test_stale_pdf_is_not_reused() {
        let runner = MockRunner::new().fail_on("-halt-on-error");
        let fx = Fixture::new(runner);
        fs::create_dir_all(fx.scratch()).unwrap();
        fs::write(fx.scratch().join("formula.pdf"), b"%PDF leftover").unwrap();

        let err = fx.render(EULER, false).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Tool);
        assert!(!fx.scratch().join("formula.pdf").exists());
        assert_eq!(fx.runner.calls_to("pdf2svg"), 0);
    }

    #[test]
    fn test_crop_vertical_fully_transparent_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blank.png");
        RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]))
            .save(&path)
            .unwrap();

        assert!(!crop_vertical(&path).unwrap());
        assert_eq!(image_dimensions(&path), Some((8, 8)));
    }

    #[test]
    fn test_crop_vertical_single_row() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("line.png");
        let image = RgbaImage::from_fn(6, 9, |x, y| {
            if y == 4 && x == 5 {
                Rgba([0, 0, 0, 1])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        image.save(&path).unwrap();

        assert!(crop_vertical(&path).unwrap());
        assert_eq!(image_dimensions(&path), Some((6, 1)));
    }
}
