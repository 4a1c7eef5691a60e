//! Configuration management for Quire.
//!
//! Parses `quire.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! Tool commands support environment variable and home directory expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//! - `~/...` - expands to the user's home directory
//!
//! Expanded fields: every key of the `[tools]` section.

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override site source directory.
    pub source_dir: Option<PathBuf>,
    /// Override output directory.
    pub output_dir: Option<PathBuf>,
    /// Override maximum image width.
    pub max_image_width: Option<u32>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "quire.toml";

/// Upper bound for `formulas.dpi`.
const MAX_DPI: u32 = 2400;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site configuration (paths are relative strings from TOML).
    site: SiteConfigRaw,
    /// Icon variant configuration.
    pub icons: IconsConfig,
    /// Formula rendering configuration.
    pub formulas: FormulasConfig,
    /// External converter commands.
    pub tools: ToolsConfig,

    /// Resolved site configuration (set after loading).
    #[serde(skip)]
    pub site_resolved: SiteConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw site configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SiteConfigRaw {
    source_dir: Option<String>,
    output_dir: Option<String>,
    languages: Option<Vec<String>>,
    max_image_width: Option<u32>,
}

/// Resolved site configuration with absolute paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Directory holding `res/`, `icons/`, `img/` and `formulas/`.
    pub source_dir: PathBuf,
    /// Root of the generated site; each language gets a subdirectory.
    pub output_dir: PathBuf,
    /// Project directory for Quire data (.quire/).
    pub project_dir: PathBuf,
    /// Languages to generate.
    pub languages: Vec<String>,
    /// Width bound for transcoded page images.
    pub max_image_width: u32,
}

impl SiteConfig {
    /// Scratch directory for converter intermediates (.quire/scratch/).
    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        self.project_dir.join("scratch")
    }
}

/// Icon variant configuration.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct IconsConfig {
    /// Rasterized icon width in pixels.
    pub size: u32,
    /// Color marker replaced in templates.
    pub marker: String,
    /// Normal state color.
    pub normal: String,
    /// Hover state color.
    pub hover: String,
    /// Selected state color.
    pub selected: String,
}

impl Default for IconsConfig {
    fn default() -> Self {
        Self {
            size: 24,
            marker: "%COLOR%".to_owned(),
            normal: "#555555".to_owned(),
            hover: "#000000".to_owned(),
            selected: "#0066cc".to_owned(),
        }
    }
}

/// Formula rendering configuration.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FormulasConfig {
    /// Rasterization resolution.
    pub dpi: u32,
    /// Trim transparent rows above and below the formula.
    pub autocrop: bool,
}

impl Default for FormulasConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            autocrop: true,
        }
    }
}

/// External converter commands.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    /// SVG to PNG rasterizer.
    pub svg_rasterizer: String,
    /// Lossless PNG optimizer; empty disables optimization.
    pub png_optimizer: String,
    /// LaTeX to PDF compiler.
    pub latex: String,
    /// PDF to SVG converter.
    pub pdf_to_svg: String,
}

impl ToolsConfig {
    /// The PNG optimizer, if enabled.
    #[must_use]
    pub fn optimizer(&self) -> Option<&str> {
        Some(self.png_optimizer.as_str()).filter(|s| !s.is_empty())
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            svg_rasterizer: "rsvg-convert".to_owned(),
            png_optimizer: "optipng".to_owned(),
            latex: "pdflatex".to_owned(),
            pdf_to_svg: "pdf2svg".to_owned(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`tools.latex`").
        field: String,
        /// Error message (e.g., "${`TEXBIN`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a numeric field to be greater than zero.
fn require_positive(value: u32, field: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `quire.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. The merged result
    /// is validated.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails or
    /// a value is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(source_dir) = &settings.source_dir {
            self.site_resolved.source_dir.clone_from(source_dir);
        }
        if let Some(output_dir) = &settings.output_dir {
            self.site_resolved.output_dir.clone_from(output_dir);
        }
        if let Some(width) = settings.max_image_width {
            self.site_resolved.max_image_width = width;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        let mut config = Self {
            site: SiteConfigRaw::default(),
            icons: IconsConfig::default(),
            formulas: FormulasConfig::default(),
            tools: ToolsConfig::default(),
            site_resolved: SiteConfig::default(),
            config_path: None,
        };
        config.resolve_paths(base);
        config
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically by [`Config::load`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_site()?;
        self.validate_icons()?;
        self.validate_formulas()?;
        self.validate_tools()?;
        Ok(())
    }

    fn validate_site(&self) -> Result<(), ConfigError> {
        require_positive(self.site_resolved.max_image_width, "site.max_image_width")?;
        if self.site_resolved.languages.is_empty() {
            return Err(ConfigError::Validation(
                "site.languages cannot be empty".to_owned(),
            ));
        }
        for lang in &self.site_resolved.languages {
            require_non_empty(lang, "site.languages")?;
        }
        Ok(())
    }

    fn validate_icons(&self) -> Result<(), ConfigError> {
        require_positive(self.icons.size, "icons.size")?;
        require_non_empty(&self.icons.marker, "icons.marker")?;
        Ok(())
    }

    fn validate_formulas(&self) -> Result<(), ConfigError> {
        let dpi = self.formulas.dpi;
        require_positive(dpi, "formulas.dpi")?;
        if dpi > MAX_DPI {
            return Err(ConfigError::Validation(format!(
                "formulas.dpi cannot exceed {MAX_DPI}"
            )));
        }
        Ok(())
    }

    /// The optimizer may be empty (disabled); the other tools are required.
    fn validate_tools(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.tools.svg_rasterizer, "tools.svg_rasterizer")?;
        require_non_empty(&self.tools.latex, "tools.latex")?;
        require_non_empty(&self.tools.pdf_to_svg, "tools.pdf_to_svg")?;
        Ok(())
    }

    /// Expand environment variable references in tool commands.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        let tools = &mut self.tools;
        tools.svg_rasterizer = expand::expand_tool(&tools.svg_rasterizer, "tools.svg_rasterizer")?;
        tools.png_optimizer = expand::expand_tool(&tools.png_optimizer, "tools.png_optimizer")?;
        tools.latex = expand::expand_tool(&tools.latex, "tools.latex")?;
        tools.pdf_to_svg = expand::expand_tool(&tools.pdf_to_svg, "tools.pdf_to_svg")?;
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.site_resolved = SiteConfig {
            source_dir: resolve(self.site.source_dir.as_deref(), "site"),
            output_dir: resolve(self.site.output_dir.as_deref(), "web"),
            project_dir: config_dir.join(".quire"),
            languages: self
                .site
                .languages
                .clone()
                .unwrap_or_else(|| vec!["en".to_owned()]),
            max_image_width: self.site.max_image_width.unwrap_or(800),
        };
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));

        assert_eq!(
            config.site_resolved,
            SiteConfig {
                source_dir: PathBuf::from("/test/site"),
                output_dir: PathBuf::from("/test/web"),
                project_dir: PathBuf::from("/test/.quire"),
                languages: vec!["en".to_owned()],
                max_image_width: 800,
            }
        );
        assert_eq!(
            config.site_resolved.scratch_dir(),
            PathBuf::from("/test/.quire/scratch")
        );
        assert_eq!(config.icons, IconsConfig::default());
        assert_eq!(config.formulas.dpi, 300);
        assert!(config.formulas.autocrop);
        assert_eq!(config.tools.optimizer(), Some("optipng"));
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.icons.size, 24);
        assert_eq!(config.tools.latex, "pdflatex");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r##"
[site]
source_dir = "content"
output_dir = "public"
languages = ["en", "de"]
max_image_width = 640

[icons]
size = 32
marker = "@@"
normal = "#111111"
hover = "#222222"
selected = "#333333"

[formulas]
dpi = 600
autocrop = false

[tools]
svg_rasterizer = "/opt/bin/rsvg-convert"
png_optimizer = ""
latex = "lualatex"
pdf_to_svg = "pdf2svg"
"##;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.site_resolved.source_dir, PathBuf::from("/project/content"));
        assert_eq!(config.site_resolved.output_dir, PathBuf::from("/project/public"));
        assert_eq!(config.site_resolved.languages, vec!["en", "de"]);
        assert_eq!(config.site_resolved.max_image_width, 640);
        assert_eq!(
            config.icons,
            IconsConfig {
                size: 32,
                marker: "@@".to_owned(),
                normal: "#111111".to_owned(),
                hover: "#222222".to_owned(),
                selected: "#333333".to_owned(),
            }
        );
        assert_eq!(config.formulas, FormulasConfig { dpi: 600, autocrop: false });
        assert_eq!(config.tools.optimizer(), None);
        assert_eq!(config.tools.latex, "lualatex");
        config.validate().unwrap();
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.apply_cli_settings(&CliSettings {
            source_dir: Some(PathBuf::from("/elsewhere/site")),
            output_dir: None,
            max_image_width: Some(1024),
        });

        assert_eq!(config.site_resolved.source_dir, PathBuf::from("/elsewhere/site"));
        assert_eq!(config.site_resolved.output_dir, PathBuf::from("/test/web"));
        assert_eq!(config.site_resolved.max_image_width, 1024);
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let before = config.site_resolved.clone();

        config.apply_cli_settings(&CliSettings::default());

        assert_eq!(config.site_resolved, before);
    }

    #[test]
    fn test_expand_env_vars_tools() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("QUIRE_TEST_TEXBIN", "/usr/local/texlive/bin");
        }

        let toml = r#"
[tools]
latex = "${QUIRE_TEST_TEXBIN}/pdflatex"
png_optimizer = "${QUIRE_TEST_OPTIMIZER:-}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();

        assert_eq!(config.tools.latex, "/usr/local/texlive/bin/pdflatex");
        assert_eq!(config.tools.optimizer(), None);

        unsafe {
            std::env::remove_var("QUIRE_TEST_TEXBIN");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("QUIRE_MISSING_RASTERIZER");
        }

        let toml = r#"
[tools]
svg_rasterizer = "${QUIRE_MISSING_RASTERIZER}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let err = config.expand_env_vars().unwrap_err();

        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("tools.svg_rasterizer"));
    }

    #[test]
    fn test_validate_default_config_passes() {
        Config::default_with_base(Path::new("/test")).validate().unwrap();
    }

    #[test]
    fn test_validate_zero_width() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.site_resolved.max_image_width = 0;

        let err = config.validate().unwrap_err();

        assert_eq!(
            err.to_string(),
            "Configuration error: site.max_image_width must be greater than 0"
        );
    }

    #[test]
    fn test_validate_empty_languages() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.site_resolved.languages.clear();

        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_icon_size_zero() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.icons.size = 0;

        assert!(config.validate().unwrap_err().to_string().contains("icons.size"));
    }

    #[test]
    fn test_validate_dpi_too_high() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.formulas.dpi = 4800;

        assert!(
            config
                .validate()
                .unwrap_err()
                .to_string()
                .contains("formulas.dpi cannot exceed 2400")
        );
    }

    #[test]
    fn test_validate_empty_latex() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.tools.latex = String::new();

        assert!(config.validate().unwrap_err().to_string().contains("tools.latex"));
    }

    #[test]
    fn test_validate_empty_optimizer_allowed() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.tools.png_optimizer = String::new();

        config.validate().unwrap();
    }

    #[test]
    fn test_load_explicit_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("quire.toml");
        std::fs::write(
            &path,
            r#"
[site]
languages = ["fr"]
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.config_path, Some(path.clone()));
        assert_eq!(config.site_resolved.languages, vec!["fr"]);
        assert_eq!(config.site_resolved.source_dir, tmp.path().join("site"));
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let err = Config::load(Some(Path::new("/nonexistent/quire.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("quire.toml");
        std::fs::write(&path, "[site\nlanguages = ").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_validates_cli_overrides() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("quire.toml");
        std::fs::write(&path, "").unwrap();
        let settings = CliSettings {
            max_image_width: Some(0),
            ..CliSettings::default()
        };

        let err = Config::load(Some(&path), Some(&settings)).unwrap_err();

        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
