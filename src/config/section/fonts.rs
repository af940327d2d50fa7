//! `[fonts]` section configuration.
//!
//! ```toml
//! [fonts]
//! woff = true
//! woff2 = true
//! display = "swap"
//! # url = "fonts/"   # prefix used in @font-face src, derived when unset
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontsConfig {
    pub woff: bool,
    pub woff2: bool,
    /// `font-display` descriptor of generated faces.
    pub display: String,
    /// URL prefix of font files as seen from the compiled stylesheet.
    ///
    /// Derived from the styles and fonts destinations when unset.
    pub url: Option<String>,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            woff: true,
            woff2: true,
            display: "swap".into(),
            url: None,
        }
    }
}

impl FontsConfig {
    pub const WOFF2: FieldPath = FieldPath::new("fonts.woff2");
    pub const DISPLAY: FieldPath = FieldPath::new("fonts.display");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.woff && !self.woff2 {
            diag.warn(Self::WOFF2, "both woff and woff2 are disabled, fonts are only declared");
        }
        const DISPLAYS: [&str; 5] = ["auto", "block", "swap", "fallback", "optional"];
        if !DISPLAYS.contains(&self.display.as_str()) {
            diag.error(
                Self::DISPLAY,
                format!("`{}` is not one of {}", self.display, DISPLAYS.join(", ")),
            );
        }
    }
}
