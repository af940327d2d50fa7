//! `[scripts]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [scripts]
//! format = "iife"        # "iife" or "esm"
//! output = "main.min.js"
//! target = "es2015"
//! minify = true
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// Output module format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptFormat {
    /// Self-invoking function, safe for a plain `<script>` tag.
    #[default]
    Iife,
    /// Keep the module as-is for `<script type="module">`.
    Esm,
}

/// Script bundling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    pub format: ScriptFormat,
    /// Output file name, written under the scripts destination.
    pub output: String,
    /// Syntax lowering target, e.g. `es2015` or `esnext`.
    pub target: String,
    pub minify: bool,
    /// Reuse the previous output while the entry is unchanged.
    pub cache: bool,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            format: ScriptFormat::Iife,
            output: "main.min.js".into(),
            target: "es2015".into(),
            minify: true,
            cache: true,
        }
    }
}

impl ScriptsConfig {
    pub const OUTPUT: FieldPath = FieldPath::new("scripts.output");
    pub const TARGET: FieldPath = FieldPath::new("scripts.target");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.output.is_empty() || self.output.contains(['/', '\\']) {
            diag.error(Self::OUTPUT, "must be a plain file name");
        }
        if self.target.trim().is_empty() {
            diag.error(Self::TARGET, "must not be empty");
        }
    }
}
