//! `[styles]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [styles]
//! output = "styles.min.css"
//! targets = ["defaults"]          # browserslist queries for prefixing
//! minify = true
//! load_paths = ["node_modules"]   # extra Sass include paths
//!
//! [styles.tailwind]
//! # enable = true                 # unset: on when `paths.styles.aux` exists
//! command = ["npx", "tailwindcss"]
//! # Runs: npx tailwindcss -c <paths.styles.aux> -i <in> -o <out>
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// Stylesheet settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    /// Output file name, written under the styles destination.
    pub output: String,
    /// Browserslist queries used for vendor prefixing.
    pub targets: Vec<String>,
    pub minify: bool,
    /// Additional Sass load paths (relative to the project root).
    pub load_paths: Vec<PathBuf>,
    pub tailwind: TailwindConfig,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            output: "styles.min.css".into(),
            targets: vec!["defaults".into()],
            minify: true,
            load_paths: Vec::new(),
            tailwind: TailwindConfig::default(),
        }
    }
}

impl StylesConfig {
    pub const OUTPUT: FieldPath = FieldPath::new("styles.output");
    pub const TARGETS: FieldPath = FieldPath::new("styles.targets");

    pub fn validate(&self, aux: Option<&Path>, diag: &mut ConfigDiagnostics) {
        if self.output.is_empty() || self.output.contains(['/', '\\']) {
            diag.error(Self::OUTPUT, "must be a plain file name");
        }
        if let Err(err) = lightningcss::targets::Browsers::from_browserslist(&self.targets) {
            diag.error(Self::TARGETS, err.to_string());
        }
        self.tailwind.validate(aux, diag);
    }
}

/// Tailwind CSS CLI run between preprocessing and minification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TailwindConfig {
    /// Explicit switch. Unset follows the presence of `paths.styles.aux`.
    pub enable: Option<bool>,
    /// Processor command (e.g., `["tailwindcss"]` or `["npx", "tailwindcss"]`).
    pub command: Vec<String>,
    /// Suppress processor banners (default: true).
    pub quiet: bool,
}

impl Default for TailwindConfig {
    fn default() -> Self {
        Self {
            enable: None,
            command: vec!["tailwindcss".into()],
            quiet: true,
        }
    }
}

impl TailwindConfig {
    pub const ENABLE: FieldPath = FieldPath::new("styles.tailwind.enable");
    pub const COMMAND: FieldPath = FieldPath::new("styles.tailwind.command");
    pub const AUX: FieldPath = FieldPath::new("paths.styles.aux");

    /// Whether the processor runs, given the resolved `paths.styles.aux`.
    pub fn is_enabled(&self, aux: Option<&Path>) -> bool {
        self.enable
            .unwrap_or_else(|| aux.is_some_and(Path::is_file))
    }

    /// Validate the processor setup.
    ///
    /// # Checks
    /// - If enabled:
    ///   - `command` must not be empty
    ///   - `command[0]` must be an installed executable (or package runner)
    ///   - the framework config (`paths.styles.aux`) should exist
    pub fn validate(&self, aux: Option<&Path>, diag: &mut ConfigDiagnostics) {
        if !self.is_enabled(aux) {
            return;
        }

        if self.command.is_empty() {
            diag.error(
                Self::COMMAND,
                format!("{} is true but {} is empty", Self::ENABLE, Self::COMMAND),
            );
            return;
        }

        let cmd = &self.command[0];
        let is_package_runner = ["npx", "bunx", "pnpx", "yarn", "dlx"].contains(&cmd.as_str());

        if which::which(cmd).is_err() {
            if is_package_runner {
                // Package runners can download packages at runtime, just hint
                if self.command.len() > 1 {
                    diag.hint(
                        Self::COMMAND,
                        format!("`{}` via `{}`, ensure the package is installed", self.command[1], cmd),
                    );
                }
            } else {
                diag.error_with_hint(
                    Self::COMMAND,
                    format!("`{cmd}` not found"),
                    format!("install the command or update {}", Self::COMMAND),
                );
            }
        }

        match aux {
            Some(path) if !path.is_file() => diag.warn(
                Self::AUX,
                format!("framework config not found: {}", path.display()),
            ),
            _ => {}
        }
    }
}
