//! Pipeline configuration management for `sluice.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── paths      # [paths.*] and the resolved PathTable
//! │   ├── views      # [views]
//! │   ├── scripts    # [scripts]
//! │   ├── styles     # [styles]
//! │   ├── images     # [images]
//! │   ├── fonts      # [fonts]
//! │   └── serve      # [serve]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   ├── field      # FieldPath
//! │   └── handle     # Global config handle
//! └── mod.rs         # PipelineConfig (this file)
//! ```
//!
//! A missing `sluice.toml` is not an error: every section has defaults that
//! describe the conventional `src/` → `dist/` layout, rooted at the current
//! directory.

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{
    AssetClass, FontsConfig, ImagesConfig, PathTable, PathsConfig, ScriptFormat, ScriptsConfig,
    ServeConfig, StylesConfig, VersionConfig, ViewsConfig,
};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath, cfg, init_config, reload_config};

use crate::{
    cli::{Cli, ServeArgs},
    debug, log,
    utils::path::normalize_path,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Environment variable selecting the pipeline mode.
pub const ENV_VAR: &str = "SLUICE_ENV";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing sluice.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// CLI arguments reference (internal use only)
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// `SLUICE_ENV=development` (internal use only)
    #[serde(skip)]
    pub dev: bool,

    /// Resolved path table (internal use only)
    #[serde(skip)]
    table: PathTable,

    pub paths: PathsConfig,
    pub views: ViewsConfig,
    pub scripts: ScriptsConfig,
    pub styles: StylesConfig,
    pub images: ImagesConfig,
    pub fonts: FontsConfig,
    pub serve: ServeConfig,
}

impl PipelineConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd to find the config file. The project root is
    /// the config file's parent directory, or cwd when there is none.
    pub fn load(cli: &'static Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let (config_path, content) = match find_config_file(&cli.config, &cwd) {
            Some(path) => {
                let content = fs::read_to_string(&path)
                    .map_err(|err| ConfigError::Io(path.clone(), err))?;
                (normalize_path(&path), content)
            }
            None => {
                debug!("config"; "{} not found, using defaults", cli.config.display());
                (cwd.join(&cli.config), String::new())
            }
        };

        let root = config_path
            .parent()
            .map_or_else(|| cwd.clone(), Path::to_path_buf);

        let mut config = Self::parse_at(&content, &root, &config_path)?;
        config.cli = Some(cli);
        config.dev = dev_mode_from_env();
        crate::logger::set_verbose(cli.verbose || config.dev);

        if let Some(args) = cli.serve_args() {
            config.apply_serve_args(&args);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse, resolve and pre-validate a config rooted at `root`.
    pub fn parse_at(content: &str, root: &Path, config_path: &Path) -> Result<Self> {
        let (mut config, ignored) = Self::parse_with_ignored(content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, config_path);
        }

        // Raw paths must be checked before they become absolute
        let mut diag = ConfigDiagnostics::new();
        config.paths.validate(&mut diag);
        diag.into_result().map_err(ConfigError::Diagnostics)?;

        config.config_path = config_path.to_path_buf();
        config.finalize(root)?;
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Resolve paths against the root and build the path table.
    fn finalize(&mut self, root: &Path) -> Result<()> {
        let root = normalize_path(root);
        // `~/` in load paths expands to the home directory
        self.styles.load_paths = self
            .styles
            .load_paths
            .iter()
            .map(|p| root.join(shellexpand::tilde(&p.to_string_lossy()).as_ref()))
            .collect();
        self.table = PathTable::new(&root, &self.paths)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        self.root = root;
        Ok(())
    }

    /// Apply `--interface` / `--port` overrides.
    fn apply_serve_args(&mut self, args: &ServeArgs) {
        if let Some(interface) = args.interface {
            self.serve.interface = interface;
        }
        if let Some(port) = args.port {
            self.serve.port = port;
        }
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Resolved path table.
    pub fn paths(&self) -> &PathTable {
        &self.table
    }

    /// Whether `path` is this config's own file.
    pub fn is_config_file(&self, path: &Path) -> bool {
        path == self.config_path
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration.
    ///
    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.views.version.validate(&mut diag);
        self.scripts.validate(&mut diag);
        let styles_aux = self.table.entry(AssetClass::Styles).aux.as_deref();
        self.styles.validate(styles_aux, &mut diag);
        self.images.validate(&mut diag);
        self.fonts.validate(&mut diag);

        diag.print_warnings();
        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }
}

/// `SLUICE_ENV=development` enables development mode.
fn dev_mode_from_env() -> bool {
    std::env::var(ENV_VAR).is_ok_and(|v| is_development(&v))
}

fn is_development(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "development" | "dev")
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config content without resolving paths.
/// Panics if there are unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> PipelineConfig {
    let (parsed, ignored) = PipelineConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

/// Build a resolved config rooted at `root`.
#[cfg(test)]
pub fn test_config_at(root: &Path, content: &str) -> PipelineConfig {
    PipelineConfig::parse_at(content, root, &root.join("sluice.toml")).unwrap()
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_str_invalid_toml() {
        let result: Result<PipelineConfig, _> = toml::from_str("[paths\ndest = \"dist\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.cli.is_none());
        assert!(!config.dev);
        assert_eq!(config.paths.dest, PathBuf::from("dist"));
        assert_eq!(config.serve.port, 5277);
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[styles]\noutput = \"a.css\"\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = PipelineConfig::parse_with_ignored(content).unwrap();
        assert_eq!(config.styles.output, "a.css");
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_parse_at_resolves_table() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path(), "[paths]\ndest = \"public\"");
        let root = normalize_path(dir.path());

        assert_eq!(config.get_root(), root);
        assert_eq!(config.paths().dest(), root.join("public"));
        assert_eq!(
            config.paths().entry(AssetClass::Fonts).dest,
            root.join("public/fonts")
        );
    }

    #[test]
    fn test_parse_at_rejects_bad_paths() {
        let dir = TempDir::new().unwrap();
        let result = PipelineConfig::parse_at(
            "[paths]\ndest = \"/tmp/out\"",
            dir.path(),
            &dir.path().join("sluice.toml"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_paths_resolved() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path(), "[styles]\nload_paths = [\"node_modules\"]");
        let root = normalize_path(dir.path());
        assert_eq!(config.styles.load_paths, vec![root.join("node_modules")]);
    }

    #[test]
    fn test_is_config_file() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path(), "");
        assert!(config.is_config_file(&dir.path().join("sluice.toml")));
        assert!(!config.is_config_file(&dir.path().join("src/sluice.toml")));
    }

    #[test]
    fn test_is_development() {
        assert!(is_development("development"));
        assert!(is_development(" Development "));
        assert!(!is_development("production"));
        assert!(!is_development(""));
    }
}
