//! Module specifier resolution.
//!
//! Follows the Node.js lookup the browser bundlers use:
//!
//! - `./x`, `../x`, `/x`: relative to the importing file, trying the path
//!   as written, then with each known extension, then as a directory
//!   (`package.json` entry or `index.*`)
//! - `name`, `@scope/name/sub`: the nearest `node_modules/<name>` walking
//!   up from the importer, entered through `exports`, `browser`, `module`
//!   or `main`
//!
//! TypeScript sources may import `./util.js` for `./util.ts`; the written
//! extension is swapped for the TypeScript ones when the file is missing.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::utils::path::normalize_path;

/// Extensions tried for extensionless specifiers, in order.
const EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "js", "jsx", "mjs", "cjs", "json"];

/// Conditions honored in `package.json` `exports`, in priority order.
const CONDITIONS: &[&str] = &["browser", "import", "module", "default", "require"];

/// Built-in Node.js modules have no browser counterpart.
const NODE_BUILTINS: &[&str] = &[
    "assert", "buffer", "child_process", "crypto", "events", "fs", "http", "https", "net", "os",
    "path", "process", "stream", "url", "util", "zlib",
];

/// Resolve `specifier` imported from `importer` to an existing file.
pub fn resolve(specifier: &str, importer: &Path) -> Result<PathBuf, String> {
    let dir = importer.parent().unwrap_or(Path::new("."));

    let found = if is_relative(specifier) {
        let target = dir.join(specifier);
        load_file(&target).or_else(|| load_dir(&target))
    } else {
        let found = load_package(specifier, dir);
        // npm polyfills such as `events` or `buffer` take precedence
        if found.is_none() && is_node_builtin(specifier) {
            return Err(format!("`{specifier}` is a Node.js built-in"));
        }
        found
    };

    found
        .map(|path| normalize_path(&path))
        .ok_or_else(|| format!("cannot resolve `{specifier}`"))
}

fn is_node_builtin(specifier: &str) -> bool {
    let bare = specifier.strip_prefix("node:").unwrap_or(specifier);
    NODE_BUILTINS.contains(&package_name(bare).0)
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
        || specifier == "."
        || specifier == ".."
}

/// `target` as a file: exact, extension appended, or `.js` swapped for `.ts`.
fn load_file(target: &Path) -> Option<PathBuf> {
    if target.is_file() {
        return Some(target.to_path_buf());
    }
    for ext in EXTENSIONS {
        let mut name: OsString = target.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        let candidate = PathBuf::from(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    let swapped: &[&str] = match target.extension().and_then(|e| e.to_str()) {
        Some("js") => &["ts", "tsx"],
        Some("jsx") => &["tsx"],
        Some("mjs") => &["mts"],
        _ => &[],
    };
    swapped
        .iter()
        .map(|ext| target.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

/// `target` as a directory: its `package.json` entry, then `index.*`.
fn load_dir(target: &Path) -> Option<PathBuf> {
    if !target.is_dir() {
        return None;
    }
    if let Some(manifest) = read_manifest(target)
        && let Some(entry) = legacy_entry(&manifest)
        && let Some(found) = load_file(&target.join(entry)).or_else(|| load_dir(&target.join(entry)))
    {
        return Some(found);
    }
    load_file(&target.join("index"))
}

/// Bare specifier through the `node_modules` chain.
fn load_package(specifier: &str, from: &Path) -> Option<PathBuf> {
    let (name, subpath) = package_name(specifier);
    if name.is_empty() {
        return None;
    }

    for dir in from.ancestors() {
        let root = dir.join("node_modules").join(name);
        if !root.is_dir() {
            continue;
        }
        let manifest = read_manifest(&root);
        let export_key = if subpath.is_empty() {
            ".".to_string()
        } else {
            format!("./{subpath}")
        };

        if let Some(exports) = manifest.as_ref().and_then(|m| m.get("exports"))
            && let Some(target) = exports_target(exports, &export_key)
        {
            return load_file(&root.join(target));
        }

        if subpath.is_empty() {
            return load_dir(&root);
        }
        let target = root.join(subpath);
        return load_file(&target).or_else(|| load_dir(&target));
    }
    None
}

/// Split `@scope/pkg/sub/path` into (`@scope/pkg`, `sub/path`).
fn package_name(specifier: &str) -> (&str, &str) {
    let segments = if specifier.starts_with('@') { 2 } else { 1 };
    let mut end = 0;
    for _ in 0..segments {
        match specifier[end..].find('/') {
            Some(i) => end += i + 1,
            None => return (specifier, ""),
        }
    }
    (&specifier[..end - 1], &specifier[end..])
}

fn read_manifest(dir: &Path) -> Option<Value> {
    let text = fs::read_to_string(dir.join("package.json")).ok()?;
    serde_json::from_str(&text).ok()
}

/// Entry from the pre-`exports` fields.
fn legacy_entry(manifest: &Value) -> Option<&str> {
    ["browser", "module", "main"]
        .iter()
        .find_map(|field| manifest.get(field).and_then(Value::as_str))
}

/// Target of `key` (`.` or `./sub`) in an `exports` field.
fn exports_target<'v>(exports: &'v Value, key: &str) -> Option<&'v str> {
    match exports {
        Value::Object(map) if map.keys().any(|k| k.starts_with('.')) => {
            map.get(key).and_then(conditional)
        }
        _ if key == "." => conditional(exports),
        _ => None,
    }
}

fn conditional(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(map) => CONDITIONS
            .iter()
            .find_map(|c| map.get(*c).and_then(conditional)),
        Value::Array(items) => items.iter().find_map(conditional),
        _ => None,
    }
}
