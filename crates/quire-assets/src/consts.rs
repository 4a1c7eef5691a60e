//! Internal constants for asset generation.

/// Width reported for GIF sources whose header cannot be decoded.
pub const DEFAULT_GIF_WIDTH: u32 = 200;

/// DPI used when rasterizing formula SVGs (glyphs stay sharp at 2-3x).
pub const DEFAULT_FORMULA_DPI: u32 = 300;

/// Default pixel width of icon state rasterizations.
pub const DEFAULT_ICON_SIZE: u32 = 24;

/// Marker replaced with the state color in icon templates.
pub const COLOR_MARKER: &str = "%COLOR%";

/// Image name substituted when an artifact could not be produced.
pub const PLACEHOLDER_IMAGE: &str = "placeholder.png";

/// Width reported for [`PLACEHOLDER_IMAGE`].
pub const PLACEHOLDER_WIDTH: u32 = 200;

/// Extension of the formula cache key stored beside the PNG.
pub const SIDECAR_EXTENSION: &str = "txt";

/// File stem of the intermediates in the formula scratch directory.
pub const FORMULA_STEM: &str = "formula";
