//! `[images]` section configuration.
//!
//! ```toml
//! [images]
//! optimize = true     # re-encode PNG/JPEG and re-serialize SVG
//! quality = 80        # JPEG quality when optimizing
//! webp = ["png", "jpg", "jpeg"]
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Re-encode instead of copying. Off by default.
    pub optimize: bool,
    /// JPEG quality (1-100).
    pub quality: u8,
    /// Raster extensions that also get a lossless `.webp` sibling.
    pub webp: Vec<String>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            optimize: false,
            quality: 80,
            webp: vec!["png".into(), "jpg".into(), "jpeg".into()],
        }
    }
}

impl ImagesConfig {
    pub const QUALITY: FieldPath = FieldPath::new("images.quality");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !(1..=100).contains(&self.quality) {
            diag.error(Self::QUALITY, format!("{} is outside 1..=100", self.quality));
        }
    }

    /// Whether a file extension is converted to WebP.
    pub fn converts_to_webp(&self, ext: &str) -> bool {
        self.webp.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_defaults() {
        let config = test_parse_config("");
        assert!(!config.images.optimize);
        assert_eq!(config.images.quality, 80);
        assert!(config.images.converts_to_webp("PNG"));
        assert!(!config.images.converts_to_webp("gif"));
    }

    #[test]
    fn test_quality_range() {
        let config = test_parse_config("[images]\nquality = 0");
        let mut diag = ConfigDiagnostics::new();
        config.images.validate(&mut diag);
        assert!(diag.has_errors());
    }
}
