//! `[paths]` section and the resolved path table.
//!
//! Every asset class has one entry describing where its sources live, which
//! files trigger a rebuild, and where output goes.
//!
//! # Example
//!
//! ```toml
//! [paths]
//! dest = "dist"                       # output root, removed by `clean`
//!
//! [paths.views]
//! src = ["src/views/index.hbs", "src/views/pages/*.hbs"]
//! watch = "src/**/*.hbs"
//! dest = ""                           # relative to the output root
//! aux = "src/views/partials"          # partials directory
//!
//! [paths.images]
//! dest = "images"
//! ```
//!
//! Omitted keys fall back to the class defaults below. `src`, `watch` and
//! `aux` are relative to the project root; a class `dest` is relative to the
//! output root.
//!
//! | class   | src                                          | watch                      | dest     | aux                      |
//! |---------|----------------------------------------------|----------------------------|----------|--------------------------|
//! | views   | `src/views/index.hbs`, `src/views/pages/*.hbs` | `src/**/*.hbs`           |          | `src/views/partials`     |
//! | scripts | `src/scripts/main.ts`                        | `src/**/*.{js,ts}`         |          |                          |
//! | styles  | `src/styles/globals.{css,sass,scss}`         | `src/**/*.{css,sass,scss}` |          | `tailwind.config.js`     |
//! | images  | `src/images/**/*.{png,jpg,jpeg,gif,svg,webp}` | `src/images/**/*`         | `images` |                          |
//! | fonts   | `src/fonts/**/*.ttf`                         | `src/fonts/**/*.ttf`       | `fonts`  | `src/styles/_fonts.scss` |
//! | assets  | `src/assets/**/*`                            | `src/assets/**/*`          |          |                          |

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::glob::{GlobError, GlobSet};
use crate::utils::path::lexical_normalize;

// ============================================================================
// AssetClass
// ============================================================================

/// A family of source files sharing one path entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Views,
    Scripts,
    Styles,
    Images,
    Fonts,
    Assets,
}

impl AssetClass {
    pub const ALL: [Self; 6] = [
        Self::Views,
        Self::Scripts,
        Self::Styles,
        Self::Images,
        Self::Fonts,
        Self::Assets,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Views => "views",
            Self::Scripts => "scripts",
            Self::Styles => "styles",
            Self::Images => "images",
            Self::Fonts => "fonts",
            Self::Assets => "assets",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }

    const fn defaults(self) -> ClassDefaults {
        match self {
            Self::Views => ClassDefaults {
                src: &["src/views/index.hbs", "src/views/pages/*.hbs"],
                watch: &["src/**/*.hbs"],
                dest: "",
                aux: Some("src/views/partials"),
            },
            Self::Scripts => ClassDefaults {
                src: &["src/scripts/main.ts"],
                watch: &["src/**/*.{js,ts}"],
                dest: "",
                aux: None,
            },
            Self::Styles => ClassDefaults {
                src: &["src/styles/globals.{css,sass,scss}"],
                watch: &["src/**/*.{css,sass,scss}"],
                dest: "",
                aux: Some("tailwind.config.js"),
            },
            Self::Images => ClassDefaults {
                src: &["src/images/**/*.{png,jpg,jpeg,gif,svg,webp}"],
                watch: &["src/images/**/*"],
                dest: "images",
                aux: None,
            },
            Self::Fonts => ClassDefaults {
                src: &["src/fonts/**/*.ttf"],
                watch: &["src/fonts/**/*.ttf"],
                dest: "fonts",
                aux: Some("src/styles/_fonts.scss"),
            },
            Self::Assets => ClassDefaults {
                src: &["src/assets/**/*"],
                watch: &["src/assets/**/*"],
                dest: "",
                aux: None,
            },
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct ClassDefaults {
    src: &'static [&'static str],
    watch: &'static [&'static str],
    dest: &'static str,
    aux: Option<&'static str>,
}

// ============================================================================
// Raw config
// ============================================================================

/// `[paths]` as written in `sluice.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Output root. Removed entirely by the `clean` task.
    pub dest: PathBuf,
    pub views: PathEntryConfig,
    pub scripts: PathEntryConfig,
    pub styles: PathEntryConfig,
    pub images: PathEntryConfig,
    pub fonts: PathEntryConfig,
    pub assets: PathEntryConfig,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dest: PathBuf::from("dist"),
            views: PathEntryConfig::default(),
            scripts: PathEntryConfig::default(),
            styles: PathEntryConfig::default(),
            images: PathEntryConfig::default(),
            fonts: PathEntryConfig::default(),
            assets: PathEntryConfig::default(),
        }
    }
}

/// One `[paths.<class>]` table. Unset keys use the class defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathEntryConfig {
    #[serde(deserialize_with = "one_or_many")]
    pub src: Option<Vec<String>>,
    #[serde(deserialize_with = "one_or_many")]
    pub watch: Option<Vec<String>>,
    pub dest: Option<PathBuf>,
    pub aux: Option<PathBuf>,
}

/// Accept either `src = "a"` or `src = ["a", "b"]`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(Some(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    }))
}

impl PathsConfig {
    pub const DEST: FieldPath = FieldPath::new("paths.dest");

    pub fn class(&self, class: AssetClass) -> &PathEntryConfig {
        match class {
            AssetClass::Views => &self.views,
            AssetClass::Scripts => &self.scripts,
            AssetClass::Styles => &self.styles,
            AssetClass::Images => &self.images,
            AssetClass::Fonts => &self.fonts,
            AssetClass::Assets => &self.assets,
        }
    }

    /// Validate raw paths before they are resolved against the root.
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.dest.as_os_str().is_empty() || escapes(&self.dest) {
            diag.error_with_hint(
                Self::DEST,
                format!("output root `{}` must stay inside the project", self.dest.display()),
                "use a relative path such as \"dist\"",
            );
        }

        for class in AssetClass::ALL {
            let entry = self.class(class);
            let fields = EntryFields::of(class);

            for (field, patterns) in [(fields.src, &entry.src), (fields.watch, &entry.watch)] {
                let Some(patterns) = patterns else { continue };
                if patterns.is_empty() {
                    diag.error(field, "glob list must not be empty");
                }
                if let Err(err) = GlobSet::new(patterns) {
                    diag.error(field, err.to_string());
                }
            }

            if let Some(dest) = &entry.dest
                && escapes(dest)
            {
                diag.error(
                    fields.dest,
                    format!("`{}` must be relative to {}", dest.display(), Self::DEST),
                );
            }
        }
    }
}

/// Field paths of one `[paths.<class>]` table.
struct EntryFields {
    src: FieldPath,
    watch: FieldPath,
    dest: FieldPath,
}

impl EntryFields {
    const fn of(class: AssetClass) -> Self {
        macro_rules! fields {
            ($name:literal) => {
                EntryFields {
                    src: FieldPath::new(concat!("paths.", $name, ".src")),
                    watch: FieldPath::new(concat!("paths.", $name, ".watch")),
                    dest: FieldPath::new(concat!("paths.", $name, ".dest")),
                }
            };
        }
        match class {
            AssetClass::Views => fields!("views"),
            AssetClass::Scripts => fields!("scripts"),
            AssetClass::Styles => fields!("styles"),
            AssetClass::Images => fields!("images"),
            AssetClass::Fonts => fields!("fonts"),
            AssetClass::Assets => fields!("assets"),
        }
    }
}

/// Absolute paths and `..` that climb out are rejected.
fn escapes(path: &Path) -> bool {
    if path.is_absolute() {
        return true;
    }
    let mut depth = 0i32;
    for component in path.components() {
        match component {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            _ => return true,
        }
        if depth < 0 {
            return true;
        }
    }
    false
}

// ============================================================================
// Resolved table
// ============================================================================

/// Resolved paths for one asset class.
#[derive(Debug, Clone, Default)]
pub struct PathEntry {
    pub src: Vec<String>,
    pub watch: Vec<String>,
    /// Absolute destination directory.
    pub dest: PathBuf,
    /// Absolute secondary file or directory of the class.
    pub aux: Option<PathBuf>,
    src_set: GlobSet,
    watch_set: GlobSet,
}

impl PathEntry {
    fn resolve(
        class: AssetClass,
        raw: &PathEntryConfig,
        root: &Path,
        dest_root: &Path,
    ) -> Result<Self, GlobError> {
        let defaults = class.defaults();
        let owned = |list: &[&str]| list.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();

        let src = raw.src.clone().unwrap_or_else(|| owned(defaults.src));
        let watch = raw.watch.clone().unwrap_or_else(|| owned(defaults.watch));
        let dest = raw
            .dest
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults.dest));
        let aux = raw.aux.clone().or_else(|| defaults.aux.map(PathBuf::from));

        Ok(Self {
            src_set: GlobSet::new(&src)?,
            watch_set: GlobSet::new(&watch)?,
            src,
            watch,
            dest: lexical_normalize(&dest_root.join(dest)),
            aux: aux.map(|p| lexical_normalize(&root.join(p))),
        })
    }

    pub fn src_set(&self) -> &GlobSet {
        &self.src_set
    }

    pub fn watch_set(&self) -> &GlobSet {
        &self.watch_set
    }
}

/// One [`PathEntry`] per [`AssetClass`], resolved against the project root.
#[derive(Debug, Clone, Default)]
pub struct PathTable {
    root: PathBuf,
    dest: PathBuf,
    entries: [PathEntry; 6],
}

impl PathTable {
    pub fn new(root: &Path, raw: &PathsConfig) -> Result<Self, GlobError> {
        let dest = lexical_normalize(&root.join(&raw.dest));
        let mut entries: [PathEntry; 6] = Default::default();
        for class in AssetClass::ALL {
            entries[class.index()] = PathEntry::resolve(class, raw.class(class), root, &dest)?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            dest,
            entries,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Output root.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn entry(&self, class: AssetClass) -> &PathEntry {
        &self.entries[class.index()]
    }

    /// Source files of a class, sorted.
    pub fn sources(&self, class: AssetClass) -> io::Result<Vec<PathBuf>> {
        self.entry(class).src_set.walk(&self.root)
    }

    /// Whether a change to `path` concerns `class`.
    pub fn watches(&self, class: AssetClass, path: &Path) -> bool {
        self.entry(class).watch_set.matches_path(path, &self.root)
    }

    /// Directories to hand to the file watcher.
    ///
    /// Literal patterns contribute their parent directory. Nested
    /// directories are dropped when an ancestor is already watched.
    pub fn watch_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .entries
            .iter()
            .flat_map(|e| e.watch_set.base_dirs(&self.root))
            .map(|dir| {
                if dir.extension().is_some() && !dir.is_dir() {
                    dir.parent().map_or(dir.clone(), Path::to_path_buf)
                } else {
                    dir
                }
            })
            .collect();
        dirs.sort();
        dirs.dedup();

        let mut roots: Vec<PathBuf> = Vec::new();
        for dir in dirs {
            if !roots.iter().any(|r| dir.starts_with(r)) {
                roots.push(dir);
            }
        }
        roots
    }
}
