//! Derived asset pipeline for Quire.
//!
//! Turns source material into files a static site can serve:
//! - bitmaps and SVG drawings transcoded to width-bounded PNG/JPEG/GIF
//! - icon state variants (normal, hover, selected) from one colored template
//! - LaTeX formula fragments rendered to cropped PNGs
//! - static resources mirrored into the output tree
//!
//! Work is skipped when the artifact is fresh: by modification time for file
//! sources, by exact source text (sidecar file) for formulas. External
//! converters run through [`Toolchain`], so tests can substitute a recording
//! runner. Failures never abort generation; [`AssetPipeline`] records one
//! message per failure in its [`StatusCollector`] and hands back a placeholder.
//!
//! # Architecture
//!
//! - [`tool`]: process runner and converter command lines
//! - [`stale`]: freshness decisions
//! - [`transcode`]: per-format conversion
//! - [`icons`]: icon variant generation
//! - [`formula`]: LaTeX → PDF → SVG → PNG chain with sidecar memo
//! - [`resources`]: resource directory synchronization
//! - [`status`]: session error collector
//! - [`pipeline`]: [`AssetPipeline`], the reporting facade over all of the above

mod consts;
mod context;
mod error;
pub mod formula;
pub mod icons;
#[cfg(any(test, feature = "mock"))]
mod mock;
pub mod pipeline;
pub mod resources;
mod sidecar;
pub mod stale;
pub mod status;
pub mod tool;
pub mod transcode;
mod write;

pub use consts::{
    COLOR_MARKER, DEFAULT_FORMULA_DPI, DEFAULT_GIF_WIDTH, DEFAULT_ICON_SIZE, PLACEHOLDER_IMAGE,
    PLACEHOLDER_WIDTH,
};
pub use context::SiteContext;
pub use error::{AssetError, ErrorKind};
pub use formula::{FormulaRenderer, RenderedFormula};
pub use icons::{IconColors, IconGenerator, IconState, IconTemplate};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockRunner;
pub use pipeline::{AssetPipeline, ImageRef, PipelineSettings, image_dest};
pub use resources::{SyncReport, sync_resources};
pub use sidecar::Sidecar;
pub use stale::{Freshness, freshness, needs_rebuild};
pub use status::StatusCollector;
pub use tool::{RasterTarget, SystemRunner, ToolInvocation, ToolOutput, ToolRunner, ToolSet, Toolchain};
pub use transcode::{ConversionJob, SourceFormat, Transcoded, TransformKind, transcode};
