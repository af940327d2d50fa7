//! Transcoders: one source file in, bytes out.
//!
//! Each transcoder wraps a third-party library and reports failures as a
//! [`TranscodeError`]. Tasks record these per file and keep going.
//!
//! | Module    | Input                  | Library                     |
//! |-----------|------------------------|-----------------------------|
//! | `view`    | `.hbs` templates       | handlebars                  |
//! | `version` | rendered HTML          | regex, blake3               |
//! | `script`  | `.ts` / `.js` entries  | oxc                         |
//! | `style`   | `.css` / `.scss`       | grass, lightningcss         |
//! | `image`   | raster images, SVG     | image, usvg                 |
//! | `font`    | `.ttf`                 | ttf-parser, flate2, brotli  |

pub mod font;
pub mod image;
pub mod script;
pub mod style;
pub mod version;
pub mod view;

use std::path::PathBuf;

use thiserror::Error;

/// Per-file transcoder failure.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("IO error on `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("template error: {0}")]
    Template(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("style error: {0}")]
    Style(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("{0}")]
    Command(String),
}

impl TranscodeError {
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(path.into(), err)
    }
}
