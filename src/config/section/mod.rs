//! Configuration section definitions.
//!
//! Each module corresponds to a section in `sluice.toml`:
//!
//! | Module    | TOML Section   | Purpose                                  |
//! |-----------|----------------|------------------------------------------|
//! | `paths`   | `[paths.*]`    | Source globs, watch globs, destinations  |
//! | `views`   | `[views]`      | Template data, version-number injection  |
//! | `scripts` | `[scripts]`    | Output format, target, minification      |
//! | `styles`  | `[styles]`     | Browser targets, Sass paths, Tailwind    |
//! | `images`  | `[images]`     | Optimization toggle, WebP extensions     |
//! | `fonts`   | `[fonts]`      | Web font formats, `@font-face` settings  |
//! | `serve`   | `[serve]`      | Development server                       |

mod fonts;
mod images;
pub mod paths;
mod scripts;
mod serve;
mod styles;
mod views;

pub use fonts::FontsConfig;
pub use images::ImagesConfig;
pub use paths::{AssetClass, PathEntry, PathTable, PathsConfig};
pub use scripts::{ScriptFormat, ScriptsConfig};
pub use serve::ServeConfig;
pub use styles::{StylesConfig, TailwindConfig};
pub use views::{VersionConfig, ViewsConfig};
