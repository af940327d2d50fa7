//! `[views]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [views]
//! strict = false                  # fail on missing template variables
//!
//! [views.data]                    # global template data
//! title = "My site"
//!
//! [views.version]
//! enable = true
//! value = "%MDS%"                 # %MDS%, %TS%, %DT% or a literal
//! key = "v"
//! to = ["js", "css"]
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// View rendering settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    /// Global data passed to every template.
    pub data: toml::Table,

    /// Treat missing variables as errors.
    pub strict: bool,

    /// Cache-busting query appended to asset URLs.
    pub version: VersionConfig,
}

/// Version-number injection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionConfig {
    pub enable: bool,
    /// Value template: `%MDS%`, `%TS%`, `%DT%` or a literal string.
    pub value: String,
    /// Query parameter name.
    pub key: String,
    /// URL extensions that receive the query.
    pub to: Vec<String>,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            enable: true,
            value: "%MDS%".into(),
            key: "v".into(),
            to: ["js", "css", "png", "jpg", "jpeg", "gif", "svg", "webp"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl VersionConfig {
    pub const KEY: FieldPath = FieldPath::new("views.version.key");
    pub const VALUE: FieldPath = FieldPath::new("views.version.value");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.enable {
            return;
        }
        if self.key.is_empty() || self.key.contains(['&', '=', '?', '#', ' ']) {
            diag.error(
                Self::KEY,
                format!("`{}` is not a valid query parameter name", self.key),
            );
        }
        if self.value.is_empty() {
            diag.error(Self::VALUE, "must not be empty");
        }
    }
}
