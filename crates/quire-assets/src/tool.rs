//! External converter invocation.
//!
//! Every converter (vector rasterizer, PNG optimizer, LaTeX compiler,
//! PDF-to-SVG converter) goes through a [`ToolRunner`]. [`SystemRunner`]
//! spawns real processes; tests substitute a recording fake.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::AssetError;

/// A single external command, fully described up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Program name or path.
    pub program: String,
    /// Command-line arguments.
    pub args: Vec<OsString>,
    /// Working directory (inherits the current one when `None`).
    pub cwd: Option<PathBuf>,
}

impl ToolInvocation {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Arguments as lossy UTF-8, for logging and matching.
    #[must_use]
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

/// Outcome of a finished process.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Whether the process exited successfully.
    pub success: bool,
    /// Human-readable exit status (e.g. `exit status: 1`).
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external converters synchronously.
pub trait ToolRunner: Send + Sync {
    /// Run `invocation` to completion.
    ///
    /// Returns `Err` only when the process could not be started; a process
    /// that ran and failed is reported through [`ToolOutput::success`].
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, AssetError>;
}

/// [`ToolRunner`] backed by `std::process`.
///
/// Output pipes are drained while waiting so chatty tools (LaTeX) cannot
/// deadlock on a full pipe buffer. There is no timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, AssetError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        tracing::debug!(
            program = %invocation.program,
            args = ?invocation.args_lossy(),
            "running external tool"
        );

        let output = command
            .spawn()
            .and_then(std::process::Child::wait_with_output)
            .map_err(|source| AssetError::ToolLaunch {
                tool: invocation.program.clone(),
                source,
            })?;

        Ok(ToolOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Rasterization target: exact pixel width or resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterTarget {
    /// Output exactly this many pixels wide, aspect preserved.
    Width(u32),
    /// Render at this DPI (formula glyphs).
    Dpi(u32),
}

/// Names of the external converters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSet {
    /// Vector to raster converter (`rsvg-convert` compatible).
    pub svg_rasterizer: String,
    /// In-place lossless PNG optimizer; `None` skips optimization.
    pub png_optimizer: Option<String>,
    /// Non-interactive LaTeX compiler producing PDF.
    pub latex: String,
    /// PDF to SVG converter.
    pub pdf_to_svg: String,
}

impl Default for ToolSet {
    fn default() -> Self {
        Self {
            svg_rasterizer: "rsvg-convert".to_owned(),
            png_optimizer: Some("optipng".to_owned()),
            latex: "pdflatex".to_owned(),
            pdf_to_svg: "pdf2svg".to_owned(),
        }
    }
}

impl ToolSet {
    fn rasterize(&self, svg: &Path, png: &Path, target: RasterTarget) -> ToolInvocation {
        let invocation = ToolInvocation::new(&self.svg_rasterizer);
        let invocation = match target {
            RasterTarget::Width(width) => invocation.arg("--width").arg(width.to_string()),
            RasterTarget::Dpi(dpi) => invocation
                .arg("--dpi-x")
                .arg(dpi.to_string())
                .arg("--dpi-y")
                .arg(dpi.to_string()),
        };
        invocation
            .arg("--format")
            .arg("png")
            .arg("--output")
            .arg(png)
            .arg(svg)
    }

    fn optimize(&self, png: &Path) -> Option<ToolInvocation> {
        self.png_optimizer.as_ref().map(|optimizer| {
            ToolInvocation::new(optimizer)
                .arg("-quiet")
                .arg("-o2")
                .arg(png)
        })
    }

    fn compile_latex(&self, tex: &Path, scratch: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.latex)
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg("-output-directory")
            .arg(scratch)
            .arg(tex)
            .current_dir(scratch)
    }

    fn pdf_to_svg(&self, pdf: &Path, svg: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.pdf_to_svg).arg(pdf).arg(svg)
    }
}

/// A [`ToolRunner`] bound to the converter names it should invoke.
pub struct Toolchain {
    runner: Box<dyn ToolRunner>,
    tools: ToolSet,
}

impl Toolchain {
    #[must_use]
    pub fn new(runner: Box<dyn ToolRunner>, tools: ToolSet) -> Self {
        Self { runner, tools }
    }

    /// Toolchain spawning real processes with the default converter names.
    #[must_use]
    pub fn system() -> Self {
        Self::new(Box::new(SystemRunner), ToolSet::default())
    }

    #[must_use]
    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Rasterize `svg` into `png`.
    pub fn rasterize(&self, svg: &Path, png: &Path, target: RasterTarget) -> Result<(), AssetError> {
        self.run_checked(&self.tools.rasterize(svg, png, target))
    }

    /// Losslessly recompress `png` in place (no-op without an optimizer).
    pub fn optimize(&self, png: &Path) -> Result<(), AssetError> {
        match self.tools.optimize(png) {
            Some(invocation) => self.run_checked(&invocation),
            None => Ok(()),
        }
    }

    /// Compile `tex` to PDF inside `scratch`.
    pub fn compile_latex(&self, tex: &Path, scratch: &Path) -> Result<(), AssetError> {
        self.run_checked(&self.tools.compile_latex(tex, scratch))
    }

    /// Convert `pdf` to `svg`.
    pub fn pdf_to_svg(&self, pdf: &Path, svg: &Path) -> Result<(), AssetError> {
        self.run_checked(&self.tools.pdf_to_svg(pdf, svg))
    }

    fn run_checked(&self, invocation: &ToolInvocation) -> Result<(), AssetError> {
        let output = self.runner.run(invocation)?;
        if output.success {
            Ok(())
        } else {
            Err(AssetError::ToolFailed {
                tool: invocation.program.clone(),
                status: output.status,
                stderr: output.stderr,
            })
        }
    }
}
