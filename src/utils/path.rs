//! Path normalization utilities.

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            lexical_normalize(path)
        } else {
            std::env::current_dir()
                .map_or_else(|_| path.to_path_buf(), |cwd| lexical_normalize(&cwd.join(path)))
        }
    })
}

/// Remove `.` and resolve `..` components without touching the filesystem.
///
/// Used for paths that may not exist yet (e.g. a destination directory).
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Path relative to `base` using forward slashes, for glob matching and logs.
///
/// Returns `None` when `path` is not under `base`.
pub fn relative_slash(path: &Path, base: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<_> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

/// Display a path relative to the project root when possible.
pub fn display_relative(path: &Path, root: &Path) -> String {
    relative_slash(path, root).unwrap_or_else(|| path.display().to_string())
}

/// Relative URL from directory `from` to directory `to`, without a
/// trailing slash. Both paths must be absolute and normalized.
pub fn relative_url(from: &Path, to: &Path) -> String {
    let from: Vec<_> = from.components().collect();
    let to: Vec<_> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_relative() {
        let normalized = normalize_path(Path::new("relative/path/file.txt"));
        assert!(normalized.is_absolute());
    }

    #[test]
    fn test_lexical_normalize() {
        assert_eq!(
            lexical_normalize(Path::new("/site/./src/../dist/")),
            PathBuf::from("/site/dist")
        );
    }

    #[test]
    fn test_relative_slash() {
        let base = Path::new("/site");
        assert_eq!(
            relative_slash(Path::new("/site/src/views/index.hbs"), base).as_deref(),
            Some("src/views/index.hbs")
        );
        assert_eq!(relative_slash(Path::new("/other/file"), base), None);
    }

    #[test]
    fn test_relative_url() {
        let dist = Path::new("/site/dist");
        assert_eq!(relative_url(dist, Path::new("/site/dist/fonts")), "fonts");
        assert_eq!(relative_url(Path::new("/site/dist/css"), Path::new("/site/dist/fonts")), "../fonts");
        assert_eq!(relative_url(dist, dist), "");
    }
}
