//! URL to filesystem path resolution.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Resolve URL to filesystem path, handling index.html for directories
pub fn resolve_path(url: &str, serve_root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url);

    // Reject paths with suspicious patterns early
    if clean.split('/').any(|segment| segment == "..") {
        return None;
    }

    let root_canonical = serve_root.canonicalize().ok()?;

    // Canonicalize to resolve symlinks and verify path is under serve_root
    if let Ok(canonical) = serve_root.join(&clean).canonicalize() {
        if !canonical.starts_with(&root_canonical) {
            return None;
        }
        if canonical.is_file() {
            return Some(canonical);
        }
        if canonical.is_dir() {
            let index = canonical.join("index.html");
            if index.is_file() {
                return Some(index);
            }
        }
    }

    // `/about` -> `about.html`
    if clean.is_empty() {
        return None;
    }
    let html = serve_root.join(format!("{clean}.html")).canonicalize().ok()?;
    (html.starts_with(&root_canonical) && html.is_file()).then_some(html)
}

/// Normalize URL: strip query and fragment, decode, trim slashes
fn normalize_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    decoded.trim_matches('/').to_string()
}
