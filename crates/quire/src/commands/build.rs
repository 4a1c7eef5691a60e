//! `quire build` command implementation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::Args;
use quire_assets::{
    AssetError, AssetPipeline, IconColors, PipelineSettings, SiteContext, SystemRunner, ToolSet,
    Toolchain,
};
use quire_config::{CliSettings, Config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Path to configuration file (default: auto-discover quire.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Site source directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Output directory (overrides config).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Maximum width of page images in pixels (overrides config).
    #[arg(long)]
    max_width: Option<u32>,

    /// Enable verbose output (log every regenerated artifact).
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildArgs {
    /// Execute the build command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the project directory cannot
    /// be created or any asset operation reported an error.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            source_dir: self.source_dir,
            output_dir: self.output_dir,
            max_image_width: self.max_width,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        ensure_project_dir(&config.site_resolved.project_dir)?;

        output.field("Source", &config.site_resolved.source_dir.display().to_string());
        output.field("Output", &config.site_resolved.output_dir.display().to_string());

        let mut pipeline = AssetPipeline::new(
            toolchain_from_config(&config),
            settings_from_config(&config),
        );
        let mut total = PassSummary::default();
        for language in &config.site_resolved.languages {
            output.language(language);
            let summary = run_pass(&mut pipeline, &config, language);
            output.info(&summary.to_string());
            total.add(&summary);
        }

        let messages = pipeline.status_mut().take();
        if !messages.is_empty() {
            output.asset_errors(&messages);
            return Err(CliError::Assets(messages.len()));
        }

        output.success(&format!("Done: {total}"));
        Ok(())
    }
}

/// Counts of one asset pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PassSummary {
    pub resources: usize,
    pub icons: usize,
    pub images: usize,
    pub formulas: usize,
}

impl PassSummary {
    fn add(&mut self, other: &Self) {
        self.resources += other.resources;
        self.icons += other.icons;
        self.images += other.images;
        self.formulas += other.formulas;
    }
}

impl std::fmt::Display for PassSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} resource(s) copied, {} icon(s), {} image(s), {} formula(s)",
            self.resources, self.icons, self.images, self.formulas
        )
    }
}

/// Build the converter toolchain from `[tools]`.
fn toolchain_from_config(config: &Config) -> Toolchain {
    let tools = &config.tools;
    Toolchain::new(
        Box::new(SystemRunner),
        ToolSet {
            svg_rasterizer: tools.svg_rasterizer.clone(),
            png_optimizer: tools.optimizer().map(str::to_owned),
            latex: tools.latex.clone(),
            pdf_to_svg: tools.pdf_to_svg.clone(),
        },
    )
}

fn settings_from_config(config: &Config) -> PipelineSettings {
    let icons = &config.icons;
    PipelineSettings {
        icon_size: icons.size,
        icon_marker: icons.marker.clone(),
        icon_colors: IconColors {
            normal: icons.normal.clone(),
            hover: icons.hover.clone(),
            selected: icons.selected.clone(),
        },
        formula_dpi: config.formulas.dpi,
    }
}

/// Run every asset operation for one language.
///
/// Errors land in the pipeline's status collector; the pass always completes.
pub(crate) fn run_pass(pipeline: &mut AssetPipeline, config: &Config, language: &str) -> PassSummary {
    let site = &config.site_resolved;
    let source = &site.source_dir;
    let ctx = SiteContext::for_language(&site.output_dir, language, site.scratch_dir());
    let mut summary = PassSummary::default();

    let res = source.join("res");
    if res.is_dir() {
        summary.resources = pipeline.sync_resources(&ctx, &res);
    }

    for template in list_files(pipeline, &source.join("icons"), Some("svg")) {
        if pipeline.make_configured_icon(&ctx, &template) == [true; 3] {
            summary.icons += 1;
        }
    }

    for (folder, dir) in list_folders(pipeline, &source.join("img")) {
        let ctx = ctx.with_folder(folder);
        for image in list_files(pipeline, &dir, None) {
            if !pipeline
                .request_image(&ctx, &image, site.max_image_width)
                .is_placeholder()
            {
                summary.images += 1;
            }
        }
    }

    for (folder, dir) in list_folders(pipeline, &source.join("formulas")) {
        let ctx = ctx.with_folder(folder);
        for tex_path in list_files(pipeline, &dir, Some("tex")) {
            let tex = match fs::read_to_string(&tex_path) {
                Ok(tex) => tex,
                Err(e) => {
                    report_io(pipeline, &tex_path, e);
                    continue;
                }
            };
            let basename = file_stem(&tex_path);
            if pipeline
                .render_formula(&ctx, tex.trim_end(), &basename, config.formulas.autocrop)
                .is_some()
            {
                summary.formulas += 1;
            }
        }
    }

    summary
}

/// Sorted regular files of `dir`, optionally filtered by extension.
///
/// A missing directory yields nothing; an unreadable one is reported.
fn list_files(pipeline: &mut AssetPipeline, dir: &Path, extension: Option<&str>) -> Vec<PathBuf> {
    let mut files: Vec<_> = read_entries(pipeline, dir)
        .into_iter()
        .filter(|p| p.is_file())
        .filter(|p| {
            extension.is_none_or(|ext| {
                p.extension()
                    .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
            })
        })
        .collect();
    files.sort();
    files
}

/// Sorted `(name, path)` of the subdirectories of `dir`.
fn list_folders(pipeline: &mut AssetPipeline, dir: &Path) -> Vec<(String, PathBuf)> {
    let mut folders: Vec<_> = read_entries(pipeline, dir)
        .into_iter()
        .filter(|p| p.is_dir())
        .map(|p| (file_name(&p), p))
        .collect();
    folders.sort();
    folders
}

fn read_entries(pipeline: &mut AssetPipeline, dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }
    match fs::read_dir(dir) {
        Ok(entries) => readable(pipeline, dir, entries)
            .into_iter()
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .map(|e| e.path())
            .collect(),
        Err(e) => {
            report_io(pipeline, dir, e);
            Vec::new()
        }
    }
}

/// Entries of a listing of `dir`; each unreadable one is reported against `dir`.
fn readable<T>(
    pipeline: &mut AssetPipeline,
    dir: &Path,
    entries: impl IntoIterator<Item = io::Result<T>>,
) -> Vec<T> {
    let mut ok = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => ok.push(entry),
            Err(e) => report_io(pipeline, dir, e),
        }
    }
    ok
}

fn report_io(pipeline: &mut AssetPipeline, path: &Path, source: io::Error) {
    let error = AssetError::Io {
        path: path.to_path_buf(),
        source,
    };
    pipeline
        .status_mut()
        .report(&path.display().to_string(), &error);
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Ensure the `.quire/` project directory exists with a `.gitignore`.
fn ensure_project_dir(project_dir: &Path) -> Result<(), CliError> {
    fs::create_dir_all(project_dir)?;

    let gitignore_path = project_dir.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(&gitignore_path, "# Automatically created by quire\n*\n")?;
    }

    Ok(())
}
