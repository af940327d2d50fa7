//! Glob patterns for the path table.
//!
//! Patterns are written relative to the project root, the way the source
//! tree is described in `sluice.toml`:
//!
//! | syntax      | matches                                   |
//! |-------------|-------------------------------------------|
//! | `*`         | any run of characters except `/`          |
//! | `?`         | one character except `/`                  |
//! | `**`        | any number of directories (incl. none)    |
//! | `[abc]`     | character class, `[!abc]` negates         |
//! | `{a,b}`     | alternatives, may nest                    |
//!
//! Each pattern compiles to an anchored [`Regex`]. [`GlobSet::walk`] enumerates
//! matching files under the root, starting from the literal base directory
//! of each pattern so unrelated trees are never scanned.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use jwalk::{Parallelism, WalkDir};
use regex::Regex;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::utils::path::relative_slash;

#[derive(Debug, Error)]
pub enum GlobError {
    #[error("unbalanced `{{`/`}}` in glob `{0}`")]
    UnbalancedBraces(String),

    #[error("unterminated character class in glob `{0}`")]
    UnterminatedClass(String),

    #[error("invalid glob `{pattern}`")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A single compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
    base: String,
}

impl Glob {
    /// Compile a glob pattern. A leading `./` is ignored.
    pub fn new(pattern: &str) -> Result<Self, GlobError> {
        let pattern = pattern.trim_start_matches("./").to_string();
        let source = translate(&pattern)?;
        let regex = Regex::new(&source).map_err(|source| GlobError::Regex {
            pattern: pattern.clone(),
            source,
        })?;
        let base = literal_base(&pattern);
        Ok(Self {
            pattern,
            regex,
            base,
        })
    }

    /// Match a root-relative, `/`-separated path.
    pub fn is_match(&self, rel: &str) -> bool {
        self.regex.is_match(rel)
    }

    /// Literal directory prefix that contains every possible match.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// A set of globs matched as a union.
#[derive(Debug, Clone, Default)]
pub struct GlobSet {
    globs: Vec<Glob>,
}

impl GlobSet {
    pub fn new<I, S>(patterns: I) -> Result<Self, GlobError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let globs = patterns
            .into_iter()
            .map(|p| Glob::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { globs })
    }

    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }

    /// Match a root-relative, `/`-separated path.
    pub fn is_match(&self, rel: &str) -> bool {
        self.globs.iter().any(|g| g.is_match(rel))
    }

    /// Match an absolute path against the set, relative to `root`.
    pub fn matches_path(&self, path: &Path, root: &Path) -> bool {
        relative_slash(path, root).is_some_and(|rel| self.is_match(&rel))
    }

    /// Path of a matching file relative to the base of the first glob that
    /// matches it. Used to mirror source trees into an output directory.
    ///
    /// A fully literal pattern maps to the bare file name.
    pub fn strip_base(&self, path: &Path, root: &Path) -> Option<PathBuf> {
        let rel = relative_slash(path, root)?;
        let glob = self.globs.iter().find(|g| g.is_match(&rel))?;
        let base = glob.base();
        if base.is_empty() {
            return Some(PathBuf::from(rel));
        }
        if base == rel {
            return Path::new(&rel).file_name().map(PathBuf::from);
        }
        rel.strip_prefix(base)
            .and_then(|r| r.strip_prefix('/'))
            .map(PathBuf::from)
    }

    /// Base directories to watch or walk (absolute, de-duplicated).
    pub fn base_dirs(&self, root: &Path) -> Vec<PathBuf> {
        let mut seen = FxHashSet::default();
        let mut dirs = Vec::new();
        for glob in &self.globs {
            let dir = root.join(glob.base());
            if seen.insert(dir.clone()) {
                dirs.push(dir);
            }
        }
        dirs
    }

    /// Enumerate existing files matching the set, sorted.
    ///
    /// Missing base directories yield no files rather than an error: an
    /// asset class with no sources is a valid (empty) input. A base directory
    /// or entry that exists but cannot be read is an error.
    pub fn walk(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut found = FxHashSet::default();
        for glob in &self.globs {
            let base = root.join(glob.base());
            if base.is_file() {
                if glob.is_match(glob.base()) {
                    found.insert(base);
                }
                continue;
            }
            if !base.is_dir() {
                continue;
            }
            fs::read_dir(&base)?;
            // Walks run inside rayon tasks; the shared pool may have no idle thread
            for entry in WalkDir::new(&base).parallelism(Parallelism::Serial) {
                let entry = entry.map_err(io::Error::from)?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                if let Some(rel) = relative_slash(&path, root)
                    && glob.is_match(&rel)
                {
                    found.insert(path);
                }
            }
        }
        let mut files: Vec<_> = found.into_iter().collect();
        files.sort();
        Ok(files)
    }
}

/// Literal leading directories of a pattern (no wildcard characters).
fn literal_base(pattern: &str) -> String {
    let cut = pattern
        .find(['*', '?', '[', '{'])
        .unwrap_or(pattern.len());
    if cut == pattern.len() {
        // Fully literal: the pattern itself is the base (file or dir)
        return pattern.trim_end_matches('/').to_string();
    }
    match pattern[..cut].rfind('/') {
        Some(slash) => pattern[..slash].to_string(),
        None => String::new(),
    }
}

/// Translate a glob into an anchored regex source.
fn translate(pattern: &str) -> Result<String, GlobError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let at_segment_start = i == 0 || chars[i - 1] == '/';
                let next = chars.get(i + 2);
                if at_segment_start && next == Some(&'/') {
                    // `**/` matches zero or more directories
                    out.push_str("(?:[^/]*/)*");
                    i += 3;
                } else if at_segment_start && next.is_none() {
                    out.push_str(".*");
                    i += 2;
                } else {
                    out.push_str("[^/]*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == ']')
                    .map(|p| p + i + 1)
                    .ok_or_else(|| GlobError::UnterminatedClass(pattern.to_string()))?;
                out.push('[');
                let mut body = &chars[i + 1..close];
                if let Some('!' | '^') = body.first() {
                    out.push('^');
                    body = &body[1..];
                }
                for &ch in body {
                    if matches!(ch, '\\' | '[' | ']' | '&' | '~') {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out.push(']');
                i = close + 1;
                continue;
            }
            '{' => {
                depth += 1;
                out.push_str("(?:");
            }
            '}' if depth > 0 => {
                depth -= 1;
                out.push(')');
            }
            '}' => return Err(GlobError::UnbalancedBraces(pattern.to_string())),
            ',' if depth > 0 => out.push('|'),
            _ => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
        i += 1;
    }

    if depth != 0 {
        return Err(GlobError::UnbalancedBraces(pattern.to_string()));
    }

    out.push('$');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn glob(p: &str) -> Glob {
        Glob::new(p).unwrap()
    }

    #[test]
    fn test_star_stays_in_segment() {
        let g = glob("src/views/pages/*.hbs");
        assert!(g.is_match("src/views/pages/about.hbs"));
        assert!(!g.is_match("src/views/pages/nested/about.hbs"));
        assert!(!g.is_match("src/views/pages/about.html"));
    }

    #[test]
    fn test_globstar_crosses_directories() {
        let g = glob("./src/**/*.hbs");
        assert!(g.is_match("src/index.hbs"));
        assert!(g.is_match("src/views/index.hbs"));
        assert!(g.is_match("src/views/partials/deep/nav.hbs"));
        assert!(!g.is_match("other/views/index.hbs"));
    }

    #[test]
    fn test_braces() {
        let g = glob("src/styles/globals.{css,sass,scss}");
        assert!(g.is_match("src/styles/globals.css"));
        assert!(g.is_match("src/styles/globals.scss"));
        assert!(!g.is_match("src/styles/globals.less"));
        assert_eq!(g.base(), "src/styles");
    }

    #[test]
    fn test_nested_braces() {
        let g = glob("src/{scripts,lib/{a,b}}/*.ts");
        assert!(g.is_match("src/scripts/main.ts"));
        assert!(g.is_match("src/lib/b/util.ts"));
        assert!(!g.is_match("src/lib/c/util.ts"));
    }

    #[test]
    fn test_question_and_class() {
        let g = glob("img/icon-?.[pP][!x]g");
        assert!(g.is_match("img/icon-1.png"));
        assert!(g.is_match("img/icon-a.Png"));
        assert!(!g.is_match("img/icon-12.png"));
        assert!(!g.is_match("img/icon-1.pxg"));
    }

    #[test]
    fn test_literal_dots_escaped() {
        let g = glob("src/scripts/main.ts");
        assert!(g.is_match("src/scripts/main.ts"));
        assert!(!g.is_match("src/scripts/mainxts"));
        assert_eq!(g.base(), "src/scripts/main.ts");
    }

    #[test]
    fn test_trailing_globstar() {
        let g = glob("dist/**");
        assert!(g.is_match("dist/a"));
        assert!(g.is_match("dist/a/b/c.css"));
        assert_eq!(g.base(), "dist");
    }

    #[test]
    fn test_unbalanced() {
        assert!(matches!(
            Glob::new("src/{a,b"),
            Err(GlobError::UnbalancedBraces(_))
        ));
        assert!(matches!(
            Glob::new("src/a}"),
            Err(GlobError::UnbalancedBraces(_))
        ));
        assert!(matches!(
            Glob::new("src/[ab"),
            Err(GlobError::UnterminatedClass(_))
        ));
    }

    #[test]
    fn test_walk_sorted_and_scoped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/views/pages")).unwrap();
        fs::create_dir_all(root.join("other")).unwrap();
        fs::write(root.join("src/views/index.hbs"), "").unwrap();
        fs::write(root.join("src/views/pages/b.hbs"), "").unwrap();
        fs::write(root.join("src/views/pages/a.hbs"), "").unwrap();
        fs::write(root.join("src/views/pages/a.txt"), "").unwrap();
        fs::write(root.join("other/x.hbs"), "").unwrap();

        let set = GlobSet::new(["./src/views/index.hbs", "./src/views/pages/*.hbs"]).unwrap();
        let files = set.walk(root).unwrap();
        let rels: Vec<_> = files
            .iter()
            .map(|p| relative_slash(p, root).unwrap())
            .collect();
        assert_eq!(
            rels,
            vec![
                "src/views/index.hbs",
                "src/views/pages/a.hbs",
                "src/views/pages/b.hbs"
            ]
        );
    }

    #[test]
    fn test_walk_from_busy_pool_threads() {
        use rayon::prelude::*;

        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/fonts/sub")).unwrap();
        fs::write(root.join("src/fonts/A-Bold.ttf"), "").unwrap();
        fs::write(root.join("src/fonts/sub/B-Light.ttf"), "").unwrap();

        // Every worker walks at once, as parallel tasks do during a build
        let set = GlobSet::new(["src/fonts/**/*.ttf"]).unwrap();
        let counts: Vec<usize> = (0..rayon::current_num_threads() * 2)
            .into_par_iter()
            .map(|_| set.walk(root).unwrap().len())
            .collect();
        assert!(counts.iter().all(|&n| n == 2), "{counts:?}");
    }

    #[test]
    fn test_walk_missing_base_is_empty() {
        let dir = TempDir::new().unwrap();
        let set = GlobSet::new(["src/fonts/**/*.ttf"]).unwrap();
        assert!(set.walk(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_strip_base() {
        let root = Path::new("/site");
        let set = GlobSet::new(["src/images/**/*.png", "src/logo.svg"]).unwrap();
        assert_eq!(
            set.strip_base(Path::new("/site/src/images/icons/a.png"), root),
            Some(PathBuf::from("icons/a.png"))
        );
        assert_eq!(
            set.strip_base(Path::new("/site/src/logo.svg"), root),
            Some(PathBuf::from("logo.svg"))
        );
        assert_eq!(set.strip_base(Path::new("/site/src/a.gif"), root), None);
    }

    #[test]
    fn test_matches_path() {
        let root = Path::new("/site");
        let set = GlobSet::new(["src/**/*.{css,sass,scss}"]).unwrap();
        assert!(set.matches_path(Path::new("/site/src/styles/_fonts.scss"), root));
        assert!(!set.matches_path(Path::new("/site/src/scripts/main.ts"), root));
        assert!(!set.matches_path(Path::new("/elsewhere/src/a.css"), root));
    }
}
