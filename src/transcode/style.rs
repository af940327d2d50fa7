//! Stylesheet compilation.
//!
//! Pipeline: preprocess (grass for `.scss` / `.sass`, lightningcss bundler
//! for `.css` `@import`s) → optional Tailwind CLI → lightningcss prefixing
//! for the browser targets → minify.

use std::fs;
use std::path::{Path, PathBuf};

use lightningcss::bundler::{Bundler, FileProvider};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use super::TranscodeError;
use crate::utils::exec::{Cmd, FilterRule, SILENT_FILTER};

/// Tailwind banners that carry no information.
const TAILWIND_FILTER: FilterRule = FilterRule::new(&["Rebuilding", "Done in", "≈ tailwindcss"]);

/// External framework processor invocation.
#[derive(Debug, Clone, Copy)]
pub struct TailwindRun<'a> {
    pub command: &'a [String],
    /// Framework config passed as `-c`.
    pub config: Option<&'a Path>,
    pub quiet: bool,
    /// Working directory (project root).
    pub cwd: &'a Path,
    /// Directory for the processor's scratch input/output files.
    pub scratch: &'a Path,
}

/// Options for one stylesheet compilation.
#[derive(Debug, Clone, Copy)]
pub struct StyleOptions<'a> {
    /// Browserslist queries.
    pub targets: &'a [String],
    pub minify: bool,
    pub load_paths: &'a [PathBuf],
    pub tailwind: Option<TailwindRun<'a>>,
}

/// Compile one entry stylesheet.
pub fn compile(path: &Path, options: &StyleOptions<'_>) -> Result<String, TranscodeError> {
    let css = preprocess(path, options.load_paths)?;
    let css = match &options.tailwind {
        Some(run) => run_tailwind(&css, run)?,
        None => css,
    };
    finish(&css, &path.display().to_string(), options.targets, options.minify)
}

/// Resolve the entry into plain CSS.
pub fn preprocess(path: &Path, load_paths: &[PathBuf]) -> Result<String, TranscodeError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("scss" | "sass") => {
            let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
            for dir in load_paths {
                options = options.load_path(dir);
            }
            grass::from_path(path, &options).map_err(|e| TranscodeError::Style(e.to_string()))
        }
        _ => bundle_imports(path),
    }
}

/// Inline `@import` rules of a plain CSS entry.
fn bundle_imports(path: &Path) -> Result<String, TranscodeError> {
    let fs = FileProvider::new();
    let mut bundler = Bundler::new(&fs, None, ParserOptions::default());
    let sheet = bundler
        .bundle(path)
        .map_err(|e| TranscodeError::Style(e.to_string()))?;
    sheet
        .to_css(PrinterOptions::default())
        .map(|out| out.code)
        .map_err(|e| TranscodeError::Style(e.to_string()))
}

/// Run the Tailwind CLI over preprocessed CSS.
///
/// Tailwind CLI arguments: `command [-c config] -i input -o output`
pub fn run_tailwind(css: &str, run: &TailwindRun<'_>) -> Result<String, TranscodeError> {
    fs::create_dir_all(run.scratch).map_err(|e| TranscodeError::io(run.scratch, e))?;
    let input = run.scratch.join(".sluice-tailwind.in.css");
    let output = run.scratch.join(".sluice-tailwind.out.css");
    fs::write(&input, css).map_err(|e| TranscodeError::io(&input, e))?;

    let mut cmd = Cmd::from_slice(run.command).cwd(run.cwd);
    if let Some(config) = run.config.filter(|c| c.is_file()) {
        cmd = cmd.arg("-c").arg(config);
    }
    let filter = if run.quiet {
        &SILENT_FILTER
    } else {
        &TAILWIND_FILTER
    };
    let result = cmd
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .filter(filter)
        .run()
        .map_err(|e| TranscodeError::Command(format!("{e:#}")))
        .and_then(|_| fs::read_to_string(&output).map_err(|e| TranscodeError::io(&output, e)));

    let _ = fs::remove_file(&input);
    let _ = fs::remove_file(&output);
    result
}

/// Prefix for the browser targets and optionally minify.
pub fn finish(
    css: &str,
    filename: &str,
    queries: &[String],
    minify: bool,
) -> Result<String, TranscodeError> {
    let targets = resolve_targets(queries)?;
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| TranscodeError::Style(e.to_string()))?;

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| TranscodeError::Style(e.to_string()))?;

    sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..PrinterOptions::default()
        })
        .map(|out| out.code)
        .map_err(|e| TranscodeError::Style(e.to_string()))
}

fn resolve_targets(queries: &[String]) -> Result<Targets, TranscodeError> {
    if queries.is_empty() {
        return Ok(Targets::default());
    }
    let browsers = Browsers::from_browserslist(queries)
        .map_err(|e| TranscodeError::Style(e.to_string()))?;
    Ok(browsers.map(Targets::from).unwrap_or_default())
}
