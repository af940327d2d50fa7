//! Build tasks.
//!
//! A task consumes every source file of its asset class, runs the files
//! through a transcoder and writes results under the class destination.
//!
//! | task                | reads             | writes                          |
//! |---------------------|-------------------|---------------------------------|
//! | `clean`             |                   | removes the output root         |
//! | `clean-font-styles` |                   | removes the font-style file     |
//! | `views`             | `.hbs`            | `<stem>.html`                   |
//! | `scripts`           | `.ts` / `.js`     | `main.min.js`                   |
//! | `styles`            | `.css` / `.scss`  | `styles.min.css`                |
//! | `webp`              | png / jpg         | `<rel>.webp`                    |
//! | `images`            | images            | `<rel>` (optionally optimized)  |
//! | `fonts`             | `.ttf`            | `.woff2`, `.woff`, font styles  |
//! | `assets`            | anything          | `<rel>`                         |
//!
//! Failures are isolated per file: one broken template does not stop the
//! other views from rendering, but the task as a whole reports failure.

mod assets;
mod clean;
mod fonts;
mod images;
mod scripts;
mod styles;
mod views;
mod webp;

pub use scripts::ScriptCache;
pub use styles::only_stylesheets;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use parking_lot::Mutex;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{AssetClass, PipelineConfig};
use crate::debug;
use crate::freshness::is_fresh;
use crate::transcode::TranscodeError;

/// Every task the orchestrator can schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum TaskKind {
    Clean,
    CleanFontStyles,
    Views,
    Scripts,
    Styles,
    Webp,
    Images,
    Fonts,
    Assets,
}

impl TaskKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::CleanFontStyles => "clean-font-styles",
            Self::Views => "views",
            Self::Scripts => "scripts",
            Self::Styles => "styles",
            Self::Webp => "webp",
            Self::Images => "images",
            Self::Fonts => "fonts",
            Self::Assets => "assets",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A file the task could not process.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of one task run.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: TaskKind,
    /// Files written, in source order.
    pub written: Vec<PathBuf>,
    /// Files left alone because their output was fresh.
    pub skipped: usize,
    pub failures: Vec<FileFailure>,
}

impl TaskReport {
    pub fn new(task: TaskKind) -> Self {
        Self {
            task,
            written: Vec::new(),
            skipped: 0,
            failures: Vec::new(),
        }
    }

    /// Fold one file's result into the report.
    ///
    /// An empty list of outputs counts as skipped.
    pub fn record(&mut self, path: &Path, result: Result<Vec<PathBuf>, TranscodeError>) {
        match result {
            Ok(outputs) if outputs.is_empty() => self.skipped += 1,
            Ok(outputs) => self.written.extend(outputs),
            Err(err) => self.fail(path, &err),
        }
    }

    pub fn fail(&mut self, path: &Path, err: &dyn std::error::Error) {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        debug!(self.task.name(); "failed {}: {}", path.display(), message);
        self.failures.push(FileFailure {
            path: path.to_path_buf(),
            message,
        });
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Err(TaskError::Files)` if any file failed.
    pub fn into_result(self) -> Result<Self, TaskError> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(TaskError::Files(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    /// Filesystem failure outside per-file processing.
    #[error("{task}: IO error on `{path}`")]
    Io {
        task: TaskKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {} file(s) failed", .0.task, .0.failures.len())]
    Files(TaskReport),
}

impl TaskError {
    fn io(task: TaskKind, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            task,
            path: path.into(),
            source,
        }
    }

    /// Filesystem errors abort the whole run, file failures only the task.
    pub fn is_hard(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Partial report of a task that ran to completion.
    pub fn report(&self) -> Option<&TaskReport> {
        match self {
            Self::Files(report) => Some(report),
            Self::Io { .. } => None,
        }
    }
}

/// Task runner holding the state that lives across runs.
#[derive(Default)]
pub struct Tasks {
    scripts: Mutex<ScriptCache>,
}

impl Tasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one task to completion.
    pub fn run(&self, kind: TaskKind, config: &PipelineConfig) -> Result<TaskReport, TaskError> {
        debug!(kind.name(); "start");
        match kind {
            TaskKind::Clean => clean::clean(config),
            TaskKind::CleanFontStyles => clean::clean_font_styles(config),
            TaskKind::Views => views::run(config),
            TaskKind::Scripts => scripts::run(config, &mut self.scripts.lock()),
            TaskKind::Styles => styles::run(config),
            TaskKind::Webp => webp::run(config),
            TaskKind::Images => images::run(config),
            TaskKind::Fonts => fonts::run(config),
            TaskKind::Assets => assets::run(config),
        }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Source files of a class. A walk failure fails the task.
fn sources(
    task: TaskKind,
    config: &PipelineConfig,
    class: AssetClass,
) -> Result<Vec<PathBuf>, TaskError> {
    let table = config.paths();
    table
        .sources(class)
        .map_err(|e| TaskError::io(task, table.root(), e))
}

/// Create a destination directory. Failure fails the task.
fn ensure_dir(task: TaskKind, dir: &Path) -> Result<(), TaskError> {
    std::fs::create_dir_all(dir).map_err(|e| TaskError::io(task, dir, e))
}

/// Run `process` over every file in parallel, recording results in source
/// order.
fn process_files<F>(task: TaskKind, files: &[PathBuf], process: F) -> TaskReport
where
    F: Fn(&Path) -> Result<Vec<PathBuf>, TranscodeError> + Sync,
{
    let results: Vec<_> = files.par_iter().map(|path| process(path)).collect();

    let mut report = TaskReport::new(task);
    for (path, result) in files.iter().zip(results) {
        report.record(path, result);
    }
    report
}

/// Write `bytes` to `path`, creating parent directories.
fn write_output(path: &Path, bytes: impl AsRef<[u8]>) -> Result<(), TranscodeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TranscodeError::io(parent, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| TranscodeError::io(path, e))
}

/// Output path mirroring `source` below its glob base inside the class
/// destination.
fn mirrored(config: &PipelineConfig, class: AssetClass, source: &Path) -> PathBuf {
    let table = config.paths();
    let entry = table.entry(class);
    let rel = entry
        .src_set()
        .strip_base(source, table.root())
        .or_else(|| source.file_name().map(PathBuf::from))
        .unwrap_or_default();
    entry.dest.join(rel)
}

/// Copy `source` to `output` unless the output is fresh.
fn copy_fresh(source: &Path, output: &Path) -> Result<Vec<PathBuf>, TranscodeError> {
    if is_fresh(source, output) {
        return Ok(Vec::new());
    }
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TranscodeError::io(parent, e))?;
    }
    std::fs::copy(source, output).map_err(|e| TranscodeError::io(source, e))?;
    Ok(vec![output.to_path_buf()])
}

/// Output path for an entry file: the configured name when the class has a
/// single entry, `<stem><suffix>` otherwise.
fn entry_output(dest: &Path, source: &Path, single: bool, configured: &str, suffix: &str) -> PathBuf {
    if single {
        return dest.join(configured);
    }
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.join(format!("{stem}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_names_match_cli_values() {
        for kind in TaskKind::value_variants() {
            let value = kind.to_possible_value().unwrap();
            assert_eq!(value.get_name(), kind.name());
        }
    }

    #[test]
    fn test_report_record() {
        let mut report = TaskReport::new(TaskKind::Images);
        report.record(Path::new("a.png"), Ok(vec![PathBuf::from("dist/a.png")]));
        report.record(Path::new("b.png"), Ok(vec![]));
        report.record(
            Path::new("c.png"),
            Err(TranscodeError::Image("bad header".into())),
        );

        assert_eq!(report.written, vec![PathBuf::from("dist/a.png")]);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("bad header"));

        let err = report.into_result().unwrap_err();
        assert!(!err.is_hard());
        assert_eq!(err.report().unwrap().written.len(), 1);
        assert_eq!(err.to_string(), "images: 1 file(s) failed");
    }

    #[test]
    fn test_failure_message_includes_source() {
        let mut report = TaskReport::new(TaskKind::Views);
        let err = TranscodeError::io("x.hbs", io::Error::other("disk on fire"));
        report.fail(Path::new("x.hbs"), &err);
        assert!(report.failures[0].message.contains("disk on fire"));
    }

    #[test]
    fn test_entry_output() {
        let dest = Path::new("/dist");
        assert_eq!(
            entry_output(dest, Path::new("src/main.ts"), true, "main.min.js", ".min.js"),
            PathBuf::from("/dist/main.min.js")
        );
        assert_eq!(
            entry_output(dest, Path::new("src/admin.ts"), false, "main.min.js", ".min.js"),
            PathBuf::from("/dist/admin.min.js")
        );
    }
}
