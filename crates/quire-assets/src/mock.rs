//! Recording [`ToolRunner`] for tests.
//!
//! [`MockRunner`] records every invocation and emulates the on-disk effect of
//! the default converters so the pipeline can run without them:
//!
//! - `rsvg-convert`: writes a PNG. With `--width N` the image is `N` x `N/2`
//!   fully opaque; with `--dpi-x D` it is `D` x `D/2` with transparent
//!   top and bottom quarters.
//! - `optipng`: no-op.
//! - `pdflatex`: writes `<output-directory>/<stem>.pdf`.
//! - `pdf2svg`: writes a minimal SVG to its second argument.
//!
//! Any other program fails to launch.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};

use crate::error::AssetError;
use crate::tool::{ToolInvocation, ToolOutput, ToolRunner};

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<ToolInvocation>,
    fail_patterns: Vec<String>,
}

/// Recording fake for the external converters.
///
/// Clones share the same call log, so a test can keep a handle after boxing
/// one into a toolchain.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    state: Arc<Mutex<MockState>>,
}

impl MockRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every invocation with an argument containing `pattern` exit with
    /// failure.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn fail_on(self, pattern: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_patterns
            .push(pattern.into());
        self
    }

    /// All recorded invocations, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.state.lock().unwrap().calls.clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// Number of recorded invocations of `program`.
    #[must_use]
    pub fn calls_to(&self, program: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.program == program)
            .count()
    }

    /// Forget recorded invocations (failure patterns are kept).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn reset_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

impl ToolRunner for MockRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, AssetError> {
        let args = invocation.args_lossy();
        let failing = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(invocation.clone());
            state
                .fail_patterns
                .iter()
                .any(|p| args.iter().any(|a| a.contains(p.as_str())))
        };

        if failing {
            return Ok(failed("mock failure"));
        }

        let result = match invocation.program.as_str() {
            "rsvg-convert" => emulate_rasterizer(&args),
            "optipng" => Ok(()),
            "pdflatex" => emulate_latex(&args),
            "pdf2svg" => emulate_pdf_to_svg(&args),
            other => {
                return Err(AssetError::ToolLaunch {
                    tool: other.to_owned(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                });
            }
        };

        Ok(match result {
            Ok(()) => ToolOutput {
                success: true,
                status: "exit status: 0".to_owned(),
                ..ToolOutput::default()
            },
            Err(message) => failed(&message),
        })
    }
}

fn failed(stderr: &str) -> ToolOutput {
    ToolOutput {
        success: false,
        status: "exit status: 1".to_owned(),
        stdout: String::new(),
        stderr: stderr.to_owned(),
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn emulate_rasterizer(args: &[String]) -> Result<(), String> {
    let output = value_after(args, "--output").ok_or("missing --output")?;
    let input = args.last().ok_or("missing input")?;
    if !Path::new(input).is_file() {
        return Err(format!("cannot open {input}"));
    }

    let image = if let Some(width) = value_after(args, "--width") {
        let width: u32 = width.parse().map_err(|_| "bad width")?;
        RgbaImage::from_pixel(width, (width / 2).max(1), Rgba([0, 0, 0, 255]))
    } else {
        let dpi: u32 = value_after(args, "--dpi-x")
            .ok_or("missing size")?
            .parse()
            .map_err(|_| "bad dpi")?;
        let height = (dpi / 2).max(4);
        RgbaImage::from_fn(dpi, height, |_, y| {
            if y < height / 4 || y >= height - height / 4 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    };

    image
        .save_with_format(output, image::ImageFormat::Png)
        .map_err(|e| e.to_string())
}

fn emulate_latex(args: &[String]) -> Result<(), String> {
    let out_dir = value_after(args, "-output-directory").ok_or("missing output dir")?;
    let tex = PathBuf::from(args.last().ok_or("missing input")?);
    let stem = tex.file_stem().ok_or("bad input")?;
    std::fs::read_to_string(&tex).map_err(|e| e.to_string())?;
    let pdf = Path::new(out_dir).join(stem).with_extension("pdf");
    std::fs::write(pdf, b"%PDF-1.5\n%mock\n").map_err(|e| e.to_string())
}

fn emulate_pdf_to_svg(args: &[String]) -> Result<(), String> {
    let [pdf, svg] = args else {
        return Err("expected <pdf> <svg>".to_owned());
    };
    if !Path::new(pdf).is_file() {
        return Err(format!("cannot open {pdf}"));
    }
    std::fs::write(svg, r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#).map_err(|e| e.to_string())
}
